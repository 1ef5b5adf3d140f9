// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language model backend trait.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::TapbackError;
use crate::types::{ModelRequest, ModelStreamEvent};

/// A boxed stream of model events.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelStreamEvent, TapbackError>> + Send>>;

/// Adapter for a language model API.
///
/// Implementations hide backend-specific fallbacks: `complete` and `stream`
/// may try a richer API first and fall back to a simpler one.
#[async_trait]
pub trait ModelProvider: Send + Sync + 'static {
    /// Single request/response call returning plain output text.
    async fn complete(&self, request: ModelRequest) -> Result<String, TapbackError>;

    /// Streaming call. Tool calls surface as events; a follow-up request with
    /// a [`crate::types::Continuation`] submits their outputs.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, TapbackError>;

    /// Upload a document and return a backend file reference.
    async fn upload_file(&self, path: &Path) -> Result<String, TapbackError>;
}
