// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AppleScript string embedding and `osascript` invocation.

use std::process::Output;

use tapback_core::TapbackError;

/// Escape text for embedding inside an AppleScript string literal.
///
/// Backslashes go first so the escapes added for quotes and line breaks
/// are not themselves doubled.
pub fn escape_applescript(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Run a script through `osascript -e` and return its output.
pub async fn run_osascript(osascript: &str, script: &str) -> Result<Output, std::io::Error> {
    tokio::process::Command::new(osascript)
        .arg("-e")
        .arg(script)
        .kill_on_drop(true)
        .output()
        .await
}

/// Blocking variant for callers already on the blocking pool.
pub fn run_osascript_blocking(osascript: &str, script: &str) -> Result<Output, std::io::Error> {
    std::process::Command::new(osascript).arg("-e").arg(script).output()
}

/// Turn a non-zero exit into a send error carrying stderr.
pub(crate) fn check_status(output: &Output) -> Result<(), TapbackError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(TapbackError::Send {
        message: format!("osascript exited with {}: {stderr}", output.status),
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        assert_eq!(escape_applescript(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_applescript(r"C:\path"), r"C:\\path");
        assert_eq!(escape_applescript("a\nb\r"), r"a\nb\r");
    }

    #[test]
    fn escaped_backslash_before_quote_is_not_reinterpreted() {
        assert_eq!(escape_applescript("\\\""), "\\\\\\\"");
    }
}
