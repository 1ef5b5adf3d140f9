// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External web search.

use async_trait::async_trait;

use crate::error::TapbackError;
use crate::types::SearchResponse;

/// A web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync + 'static {
    /// Whether a credential is provisioned. Unconfigured search is not an error state.
    fn is_configured(&self) -> bool;

    /// Run a live search. Returns [`TapbackError::SearchNotConfigured`] without a credential.
    async fn search(&self, query: &str, k: usize) -> Result<SearchResponse, TapbackError>;
}
