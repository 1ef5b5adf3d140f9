// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of `@name` mentions to conversation participants.
//!
//! Matching is case-insensitive against participant display names, in three
//! tiers: exact name, name prefix, then substring. The first tier with any
//! match decides. One candidate resolves the mention, several make it
//! ambiguous, none leave it missing.

use tapback_core::{ChatSource, Participant, normalize_handle};
use tracing::{debug, warn};

/// Messages scanned for a resolved participant's latest text.
const EXCERPT_SCAN_LIMIT: usize = 50;

/// A mention matched to exactly one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMention {
    pub mention: String,
    pub handle: String,
    pub name: Option<String>,
    /// The participant's most recent non-empty message, if any.
    pub latest_text: Option<String>,
}

impl ResolvedMention {
    fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.handle)
    }
}

/// Outcome of resolving every mention in a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionResolution {
    pub resolved: Vec<ResolvedMention>,
    pub ambiguous: Vec<(String, Vec<Participant>)>,
    pub missing: Vec<String>,
}

/// Participants whose display name matches `mention`, using the first
/// non-empty tier.
pub fn match_participants<'a>(participants: &'a [Participant], mention: &str) -> Vec<&'a Participant> {
    let needle = mention.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let named: Vec<(&Participant, String)> = participants
        .iter()
        .filter_map(|p| {
            let name = p.name.as_deref()?.trim().to_lowercase();
            (!name.is_empty()).then_some((p, name))
        })
        .collect();

    let tiers: [&dyn Fn(&str) -> bool; 3] = [
        &|name| name == needle,
        &|name| name.starts_with(&needle),
        &|name| name.contains(&needle),
    ];
    for tier in tiers {
        let hits: Vec<_> = named.iter().filter(|(_, n)| tier(n.as_str())).map(|(p, _)| *p).collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

/// Resolve `mentions` against the participants of `chat_guid`.
///
/// Store errors degrade to treating every mention as missing.
pub async fn resolve_mentions(
    source: &dyn ChatSource,
    chat_guid: &str,
    mentions: &[String],
) -> MentionResolution {
    let mut out = MentionResolution::default();
    if chat_guid.is_empty() || mentions.is_empty() {
        return out;
    }

    let participants = match source.fetch_participants(chat_guid).await {
        Ok(p) => p,
        Err(e) => {
            warn!(chat = %chat_guid, error = %e, "participant lookup failed");
            out.missing = mentions.to_vec();
            return out;
        }
    };

    for mention in mentions.iter().filter(|m| !m.trim().is_empty()) {
        let candidates = match_participants(&participants, mention);
        match candidates.as_slice() {
            [] => out.missing.push(mention.clone()),
            [only] => {
                let latest_text = latest_text_from(source, chat_guid, &only.handle).await;
                out.resolved.push(ResolvedMention {
                    mention: mention.clone(),
                    handle: only.handle.clone(),
                    name: only.name.clone(),
                    latest_text,
                });
            }
            many => out
                .ambiguous
                .push((mention.clone(), many.iter().map(|p| (*p).clone()).collect())),
        }
    }
    debug!(
        chat = %chat_guid,
        resolved = out.resolved.len(),
        ambiguous = out.ambiguous.len(),
        missing = out.missing.len(),
        "mentions resolved"
    );
    out
}

async fn latest_text_from(source: &dyn ChatSource, chat_guid: &str, handle: &str) -> Option<String> {
    let target = normalize_handle(handle);
    let history = source
        .fetch_recent_messages(chat_guid, EXCERPT_SCAN_LIMIT)
        .await
        .inspect_err(|e| debug!(chat = %chat_guid, error = %e, "history lookup failed"))
        .ok()?;
    history
        .iter()
        .rev()
        .filter(|m| !m.is_from_me && m.handle == target)
        .map(|m| m.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Reply asking the requester to pick one candidate per ambiguous mention.
pub fn disambiguation_prompt(ambiguous: &[(String, Vec<Participant>)]) -> String {
    let mut lines = vec!["I found multiple matches:".to_string()];
    for (mention, candidates) in ambiguous {
        lines.push(format!("For @{mention}:"));
        for (i, c) in candidates.iter().enumerate() {
            lines.push(format!("  {}. {} ({})", i + 1, c.display(), c.handle));
        }
    }
    lines.push(String::new());
    lines.push("Please reply like: '@ai choose 2 for @jon' or '@ai choose 1 for @mary'.".to_string());
    lines.join("\n")
}

/// Extra model context quoting each resolved participant's latest message.
pub fn mention_context(resolved: &[ResolvedMention]) -> Option<String> {
    let blocks: Vec<String> = resolved
        .iter()
        .filter_map(|r| {
            let text = r.latest_text.as_deref()?;
            Some(format!("Target from @{} ({}):\n{text}", r.mention, r.display()))
        })
        .collect();
    (!blocks.is_empty()).then(|| blocks.join("\n\n"))
}
