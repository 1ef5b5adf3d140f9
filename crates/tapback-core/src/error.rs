// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tapback agent.

use thiserror::Error;

/// The primary error type used across all Tapback adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TapbackError {
    /// Configuration errors (invalid TOML, unusable paths, missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local persistence errors (state files, settings files, query failures).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The chat store could not be opened at all, usually a missing
    /// Full Disk Access grant. Reported separately from query failures.
    #[error("message store unreachable at {path}: {source}")]
    SourceUnreachable {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Language model backend errors (HTTP failure, malformed payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend does not offer the requested API surface.
    #[error("provider endpoint unavailable: {0}")]
    ProviderUnavailable(String),

    /// Web search has no credential provisioned.
    #[error("web search is not configured")]
    SearchNotConfigured,

    /// Web search was attempted and failed upstream.
    #[error("search error: {message}")]
    Search {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound delivery failed.
    #[error("send error: {message}")]
    Send {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A caller supplied arguments that cannot be acted on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TapbackError {
    /// Wrap any storage-layer error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Provider error with a message and no underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// True for errors that mean the chat store itself is inaccessible.
    pub fn is_source_unreachable(&self) -> bool {
        matches!(self, Self::SourceUnreachable { .. })
    }
}
