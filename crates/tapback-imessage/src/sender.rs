// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply delivery through Messages.app.

use async_trait::async_trait;
use tapback_core::{MessageSender, OutboundTarget, TapbackError};
use tracing::{debug, warn};

use crate::applescript::{check_status, escape_applescript, run_osascript};

/// [`MessageSender`] that drives Messages.app via `osascript`.
///
/// Messages.app handles one scripted send at a time; callers serialize sends.
pub struct AppleScriptSender {
    osascript: String,
}

impl AppleScriptSender {
    pub fn new(osascript: impl Into<String>) -> Self {
        Self {
            osascript: osascript.into(),
        }
    }
}

impl Default for AppleScriptSender {
    fn default() -> Self {
        Self::new("osascript")
    }
}

/// Build the send script for a target. All interpolated values are escaped.
pub fn build_send_script(text: &str, target: &OutboundTarget) -> String {
    let msg = escape_applescript(text);
    match target {
        OutboundTarget::Chat(guid) => format!(
            "tell application \"Messages\"\n\
             \tset theChat to a reference to chat id \"{}\"\n\
             \tsend \"{msg}\" to theChat\n\
             end tell",
            escape_applescript(guid)
        ),
        OutboundTarget::Phone(phone) => format!(
            "tell application \"Messages\"\n\
             \tset targetService to 1st account whose service type = iMessage\n\
             \tset targetBuddy to buddy \"{}\" of targetService\n\
             \tsend \"{msg}\" to targetBuddy\n\
             end tell",
            escape_applescript(phone)
        ),
    }
}

#[async_trait]
impl MessageSender for AppleScriptSender {
    async fn send(&self, text: &str, target: &OutboundTarget) -> Result<(), TapbackError> {
        let script = build_send_script(text, target);
        let output = run_osascript(&self.osascript, &script)
            .await
            .map_err(|e| TapbackError::Send {
                message: format!("failed to launch {}", self.osascript),
                source: Some(Box::new(e)),
            })?;

        match check_status(&output) {
            Ok(()) => {
                debug!(?target, chars = text.chars().count(), "message handed to Messages.app");
                Ok(())
            }
            Err(e) => {
                warn!(?target, error = %e, "Messages.app rejected send");
                Err(e)
            }
        }
    }
}
