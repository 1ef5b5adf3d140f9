// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword-based routing of triggered commands.
//!
//! The classifier only reads the command text. Whether a route is actually
//! taken also depends on the conversation (an image request with no recent
//! images falls through), so [`route_candidates`] returns every applicable
//! intent in priority order and the dispatcher takes the first one that can
//! be served.

use std::sync::LazyLock;

use regex::Regex;

use crate::trigger::parse_mentions;

/// What a triggered command is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Describe recently shared images.
    Image,
    /// Summarize recently shared PDFs.
    Document,
    /// Answer with excerpts from mentioned participants as extra context.
    Mention,
    /// A plain streamed chat reply.
    PlainChat,
}

const IMAGE_CUES: &[&str] = &[
    "describe",
    "image",
    "picture",
    "photo",
    "pic",
    "what is this",
    "what's this",
];

const DOCUMENT_NOUNS: &[&str] = &["pdf", "document", "article", "paper", "report"];

const SUMMARY_VERBS: &[&str] = &[
    "summary",
    "summarize",
    "tl;dr",
    "quick summary",
    "short summary",
    "overview",
    "explain",
];

/// Most attachments a single command may ask for.
pub const MAX_REQUESTED: usize = 5;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").unwrap());

/// Whether the command asks about an image.
pub fn wants_image(command: &str) -> bool {
    let lower = command.to_lowercase();
    IMAGE_CUES.iter().any(|cue| lower.contains(cue))
}

/// Whether the command asks for a summary of a document.
pub fn wants_document(command: &str) -> bool {
    let lower = command.to_lowercase();
    DOCUMENT_NOUNS.iter().any(|noun| lower.contains(noun))
        && SUMMARY_VERBS.iter().any(|verb| lower.contains(verb))
}

/// The highest-priority intent for `command`.
pub fn classify(command: &str, tag: &str) -> Intent {
    route_candidates(command, tag)
        .first()
        .copied()
        .unwrap_or(Intent::PlainChat)
}

/// Every intent that applies to `command`, highest priority first.
/// Always ends with [`Intent::PlainChat`].
pub fn route_candidates(command: &str, tag: &str) -> Vec<Intent> {
    let mut candidates = Vec::with_capacity(4);
    if wants_image(command) {
        candidates.push(Intent::Image);
    }
    if wants_document(command) {
        candidates.push(Intent::Document);
    }
    if !parse_mentions(command, tag).is_empty() {
        candidates.push(Intent::Mention);
    }
    candidates.push(Intent::PlainChat);
    candidates
}

/// How many recent attachments the command refers to, in `[1, 5]`.
///
/// "all" means five, "both"/"couple" two, "few"/"several" three. Number
/// words and digits are taken literally. Anything else yields `default`.
pub fn infer_requested_count(text: &str, default: usize) -> usize {
    let clamp = |n: usize| n.clamp(1, MAX_REQUESTED);
    let lower = text.to_lowercase();
    if lower.trim().is_empty() {
        return clamp(default);
    }
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |w: &str| words.contains(&w);

    if has_word("all") {
        return MAX_REQUESTED;
    }
    if has_word("both") || has_word("couple") {
        return 2;
    }
    if has_word("few")
        || has_word("several")
        || [
            "more picture",
            "more images",
            "more pics",
            "recent pictures",
            "recent images",
        ]
        .iter()
        .any(|phrase| lower.contains(phrase))
    {
        return 3;
    }
    for (word, n) in [("two", 2), ("three", 3), ("four", 4), ("five", 5)] {
        if has_word(word) {
            return n;
        }
    }
    if let Some(n) = DIGITS
        .captures(&lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
    {
        return clamp(n);
    }
    clamp(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_keywords_route_to_image() {
        assert_eq!(classify("describe this", "@ai"), Intent::Image);
        assert_eq!(classify("What's this?", "@ai"), Intent::Image);
        assert_eq!(classify("who is in the photo", "@ai"), Intent::Image);
    }

    #[test]
    fn document_needs_noun_and_verb() {
        assert_eq!(classify("summarize the pdf", "@ai"), Intent::Document);
        assert_eq!(classify("give me a tl;dr of that article", "@ai"), Intent::Document);
        assert_eq!(classify("open the pdf", "@ai"), Intent::PlainChat);
        assert_eq!(classify("summarize our chat", "@ai"), Intent::PlainChat);
    }

    #[test]
    fn mentions_and_plain_chat() {
        assert_eq!(classify("what did @jon say", "@ai"), Intent::Mention);
        assert_eq!(classify("what's 2+2", "@ai"), Intent::PlainChat);
    }

    #[test]
    fn candidates_are_priority_ordered() {
        assert_eq!(
            route_candidates("describe the image in the pdf and summarize @jon", "@ai"),
            vec![Intent::Image, Intent::Document, Intent::Mention, Intent::PlainChat]
        );
        assert_eq!(route_candidates("hello", "@ai"), vec![Intent::PlainChat]);
    }

    #[test]
    fn requested_count_keywords() {
        assert_eq!(infer_requested_count("describe all of them", 1), 5);
        assert_eq!(infer_requested_count("describe both", 1), 2);
        assert_eq!(infer_requested_count("a couple pics", 1), 2);
        assert_eq!(infer_requested_count("the last few", 1), 3);
        assert_eq!(infer_requested_count("the recent images", 1), 3);
        assert_eq!(infer_requested_count("last three photos", 1), 3);
    }

    #[test]
    fn requested_count_digits_are_clamped() {
        assert_eq!(infer_requested_count("last 4 photos", 1), 4);
        assert_eq!(infer_requested_count("last 12 photos", 1), 5);
        assert_eq!(infer_requested_count("last 0 photos", 1), 1);
    }

    #[test]
    fn requested_count_defaults() {
        assert_eq!(infer_requested_count("describe this", 1), 1);
        assert_eq!(infer_requested_count("", 9), 5);
        assert_eq!(infer_requested_count("a small picture", 1), 1);
    }
}
