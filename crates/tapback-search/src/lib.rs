// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web search for the Tapback agent.
//!
//! [`TavilyClient`] implements [`tapback_core::WebSearch`] against the Tavily
//! API. [`CachedSearch`] wraps any backend with a lazily expiring cache, and
//! [`should_force_search`] decides when a command skips straight to search.

pub mod cache;
pub mod client;
pub mod format;
pub mod heuristic;

pub use cache::{CachedSearch, normalize_query};
pub use client::TavilyClient;
pub use format::{format_fast_path, format_prefetch};
pub use heuristic::should_force_search;
