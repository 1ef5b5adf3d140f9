// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger tag detection and `@name` mention parsing.

use regex::RegexBuilder;

/// Characters stripped from both ends of an extracted command.
const COMMAND_TRIM: &[char] = &[' ', ':', '\n', '\t', '\r'];

/// Punctuation stripped from the end of a mention token.
const MENTION_TRAILING: &[char] = &['.', ',', ':', ';', '!', '?', ')'];

/// Return the text after the first case-insensitive occurrence of `tag`.
///
/// Leading and trailing spaces, colons, and line breaks are removed. Returns
/// an empty string when either input is empty or the tag is absent.
pub fn extract_command(text: &str, tag: &str) -> String {
    if text.is_empty() || tag.is_empty() {
        return String::new();
    }
    let Ok(pattern) = RegexBuilder::new(&regex::escape(tag))
        .case_insensitive(true)
        .build()
    else {
        return String::new();
    };
    match pattern.find(text) {
        Some(m) => text[m.end()..].trim_matches(COMMAND_TRIM).to_string(),
        None => String::new(),
    }
}

/// Collect lowercase `@name` mentions from a command, excluding the agent's
/// own tag and the literal `@ai`.
pub fn parse_mentions(command: &str, tag: &str) -> Vec<String> {
    let own = tag.trim_start_matches('@').to_lowercase();
    command
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('@'))
        .map(|name| name.trim_end_matches(MENTION_TRAILING).to_lowercase())
        .filter(|name| !name.is_empty() && name != "ai" && *name != own)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_text_after_tag() {
        assert_eq!(extract_command("hey @ai  : do the thing", "@ai"), "do the thing");
        assert_eq!(extract_command("@AI What's 2+2?", "@ai"), "What's 2+2?");
        assert_eq!(extract_command("no trigger here", "@ai"), "");
    }

    #[test]
    fn empty_inputs_yield_empty_command() {
        assert_eq!(extract_command("", "@ai"), "");
        assert_eq!(extract_command("@ai hello", ""), "");
        assert_eq!(extract_command("@ai :\n", "@ai"), "");
    }

    #[test]
    fn only_first_occurrence_counts() {
        assert_eq!(
            extract_command("@ai tell @ai a joke", "@ai"),
            "tell @ai a joke"
        );
    }

    #[test]
    fn tag_with_regex_metacharacters_is_literal() {
        assert_eq!(extract_command("hi +bot? ping", "+bot?"), "ping");
        assert_eq!(extract_command("hi bot ping", "+bot?"), "");
    }

    #[test]
    fn mentions_skip_agent_tag_and_strip_punctuation() {
        assert_eq!(
            parse_mentions("what did @Jon, say to @mary? @ai", "@ai"),
            vec!["jon".to_string(), "mary".to_string()]
        );
        assert_eq!(parse_mentions("ask @bot and @sam", "@bot"), vec!["sam".to_string()]);
        assert!(parse_mentions("@ @. nothing", "@ai").is_empty());
    }

    proptest! {
        #[test]
        fn text_without_tag_never_triggers(text in "[a-z0-9 ,.!?]{0,40}") {
            prop_assert_eq!(extract_command(&text, "@ai"), "");
        }

        #[test]
        fn extracted_command_is_trimmed(body in "[ :\\t]{0,3}[a-z]{1,10}[ :\\n]{0,3}") {
            let command = extract_command(&format!("@ai{body}"), "@ai");
            prop_assert!(!command.starts_with(COMMAND_TRIM));
            prop_assert!(!command.ends_with(COMMAND_TRIM));
        }
    }
}
