// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history rendered as plain-text model context.

use tapback_core::Message;

/// Render `history` (oldest first) as a context block.
///
/// Empty messages are skipped. The header reports `window`, the configured
/// limit, rather than the number of lines that follow.
pub fn format_context(history: &[Message], requester: Option<&str>, window: usize) -> String {
    let mut lines = vec![format!("Conversation history (latest {window} messages):")];
    for message in history.iter().filter(|m| !m.text.is_empty()) {
        let speaker = if message.is_from_me {
            "Me"
        } else if message.handle.is_empty() {
            "Participant"
        } else {
            message.handle.as_str()
        };
        lines.push(format!("- {speaker}: {}", message.text));
    }
    if let Some(requester) = requester.filter(|r| !r.is_empty()) {
        lines.push(String::new());
        lines.push(format!("Requester: {requester}"));
    }
    lines.push(String::new());
    lines.push("Respond to the latest user message. Keep it concise.".to_string());
    lines.join("\n")
}
