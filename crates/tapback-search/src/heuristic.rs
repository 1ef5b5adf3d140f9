// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decide whether a command should go straight to web search.

/// Directive prefixes. Ones ending in `:` or a space are stripped from the query.
const DIRECTIVE_PREFIXES: &[&str] = &[
    "search:",
    "search ",
    "news:",
    "news ",
    "latest ",
    "headlines",
    "latest stock price",
    "stock price",
];

/// Words that mark a time-sensitive question.
const BROWSE_CUES: &[&str] = &[
    "today",
    "breaking",
    "headline",
    "latest",
    "stock price",
    "market today",
];

/// Return the query to search for, or `None` when the command should go to the model.
pub fn should_force_search(command: &str) -> Option<String> {
    let command = command.trim();
    if command.is_empty() {
        return None;
    }
    let lower = command.to_lowercase();

    for prefix in DIRECTIVE_PREFIXES {
        if lower.starts_with(prefix) {
            if prefix.ends_with(':') || prefix.ends_with(' ') {
                // Prefixes are ASCII, so the byte offset is valid in the original.
                let rest = command.get(prefix.len()..).unwrap_or_default().trim();
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
            return Some(command.to_string());
        }
    }

    BROWSE_CUES
        .iter()
        .any(|cue| lower.contains(cue))
        .then(|| command.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_prefix_is_stripped() {
        assert_eq!(should_force_search("search: rust 2024 edition").as_deref(), Some("rust 2024 edition"));
        assert_eq!(should_force_search("News elections").as_deref(), Some("elections"));
        assert_eq!(should_force_search("latest  iphone ").as_deref(), Some("iphone"));
    }

    #[test]
    fn bare_prefix_keeps_whole_command() {
        assert_eq!(should_force_search("search:").as_deref(), Some("search:"));
        assert_eq!(should_force_search("headlines please").as_deref(), Some("headlines please"));
        assert_eq!(should_force_search("stock price AAPL").as_deref(), Some("stock price AAPL"));
    }

    #[test]
    fn cue_words_force_search() {
        assert_eq!(
            should_force_search("what's the news today").as_deref(),
            Some("what's the news today")
        );
        assert!(should_force_search("any BREAKING stories?").is_some());
    }

    #[test]
    fn ordinary_chat_is_left_alone() {
        assert_eq!(should_force_search("hello there"), None);
        assert_eq!(should_force_search("   "), None);
    }
}
