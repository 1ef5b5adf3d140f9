// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-reloadable AI settings and their policy bounds.
//!
//! Out-of-range numeric values are clamped, never rejected. The clamps run
//! both when settings are stored and at every point of use, so a provider
//! handing out an unclamped snapshot still cannot push the engine outside
//! these bounds.

use serde::{Deserialize, Serialize};

use crate::identity::normalize_handle;

pub const CONTEXT_WINDOW_MIN: usize = 1;
pub const CONTEXT_WINDOW_MAX: usize = 100;
pub const IMAGE_CHUNK_MIN: usize = 1;
pub const IMAGE_CHUNK_MAX: usize = 20;
pub const SEARCH_RESULTS_MIN: usize = 1;
pub const SEARCH_RESULTS_MAX: usize = 10;

/// Clamp a conversation history window to [1, 100].
pub fn clamp_context_window(n: usize) -> usize {
    n.clamp(CONTEXT_WINDOW_MIN, CONTEXT_WINDOW_MAX)
}

/// Clamp an image batch size to [1, 20].
pub fn clamp_image_chunk(n: usize) -> usize {
    n.clamp(IMAGE_CHUNK_MIN, IMAGE_CHUNK_MAX)
}

/// Clamp a search result count to [1, 10].
pub fn clamp_search_results(n: usize) -> usize {
    n.clamp(SEARCH_RESULTS_MIN, SEARCH_RESULTS_MAX)
}

/// Settings consumed by the dispatch loop and the response engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiSettings {
    /// Marker that must precede a command, matched case-insensitively.
    #[serde(default = "default_trigger_tag")]
    pub trigger_tag: String,

    /// Normalized handles allowed to invoke the agent.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Number of recent messages rendered into the model context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Default number of images attached to a description request.
    #[serde(default = "default_image_chunk_size")]
    pub image_chunk_size: usize,

    #[serde(default)]
    pub enable_search: bool,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    /// Search cache time-to-live in seconds.
    #[serde(default = "default_search_cache_ttl")]
    pub search_cache_ttl: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            trigger_tag: default_trigger_tag(),
            allowed_users: Vec::new(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            context_window: default_context_window(),
            image_chunk_size: default_image_chunk_size(),
            enable_search: false,
            search_max_results: default_search_max_results(),
            search_cache_ttl: default_search_cache_ttl(),
        }
    }
}

fn default_trigger_tag() -> String {
    "@ai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a concise, helpful assistant. Keep answers brief.".to_string()
}

fn default_context_window() -> usize {
    25
}

fn default_image_chunk_size() -> usize {
    5
}

fn default_search_max_results() -> usize {
    5
}

fn default_search_cache_ttl() -> u64 {
    120
}

impl AiSettings {
    /// Return a copy with every numeric field clamped and the allow-list normalized.
    pub fn normalized(mut self) -> Self {
        self.context_window = clamp_context_window(self.context_window);
        self.image_chunk_size = clamp_image_chunk(self.image_chunk_size);
        self.search_max_results = clamp_search_results(self.search_max_results);
        self.search_cache_ttl = self.search_cache_ttl.max(1);
        if self.trigger_tag.trim().is_empty() {
            self.trigger_tag = default_trigger_tag();
        }
        self.allowed_users = normalize_allow_list(&self.allowed_users);
        self
    }

    /// Membership test using the same normalization as inbound senders.
    pub fn is_allowed(&self, sender: &str) -> bool {
        let handle = normalize_handle(sender);
        !handle.is_empty() && self.allowed_users.iter().any(|u| normalize_handle(u) == handle)
    }
}

/// Normalize, drop empties, dedupe, and sort an allow-list.
pub fn normalize_allow_list<S: AsRef<str>>(users: &[S]) -> Vec<String> {
    let mut out: Vec<String> = users
        .iter()
        .map(|u| normalize_handle(u.as_ref()))
        .filter(|u| !u.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// A partial settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiSettingsPatch {
    pub trigger_tag: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub context_window: Option<usize>,
    pub image_chunk_size: Option<usize>,
    pub enable_search: Option<bool>,
    pub search_max_results: Option<usize>,
    pub search_cache_ttl: Option<u64>,
}

impl AiSettingsPatch {
    /// Apply onto a base, producing normalized settings.
    pub fn apply(self, base: &AiSettings) -> AiSettings {
        let mut next = base.clone();
        if let Some(tag) = self.trigger_tag.filter(|t| !t.trim().is_empty()) {
            next.trigger_tag = tag.trim().to_string();
        }
        if let Some(model) = self.model.filter(|m| !m.trim().is_empty()) {
            next.model = model.trim().to_string();
        }
        if let Some(prompt) = self.system_prompt {
            next.system_prompt = prompt;
        }
        if let Some(n) = self.context_window {
            next.context_window = n;
        }
        if let Some(n) = self.image_chunk_size {
            next.image_chunk_size = n;
        }
        if let Some(flag) = self.enable_search {
            next.enable_search = flag;
        }
        if let Some(n) = self.search_max_results {
            next.search_max_results = n;
        }
        if let Some(ttl) = self.search_cache_ttl {
            next.search_cache_ttl = ttl;
        }
        next.normalized()
    }
}
