// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! `MockProvider` implements `ModelProvider` with scripted streams and
//! completions, and records every request for assertions.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use tapback_core::types::{ModelRequest, ModelStreamEvent};
use tapback_core::{ModelProvider, ModelStream, TapbackError};

/// One scripted streaming turn.
pub type ScriptedTurn = Result<Vec<ModelStreamEvent>, String>;

/// A mock model provider.
///
/// Streams and completions are popped from FIFO queues. An empty stream
/// queue yields a single "mock response" delta; an empty completion queue
/// returns "mock response".
pub struct MockProvider {
    streams: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    completions: Arc<Mutex<VecDeque<Result<String, String>>>>,
    uploads: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            streams: Arc::new(Mutex::new(VecDeque::new())),
            completions: Arc::new(Mutex::new(VecDeque::new())),
            uploads: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a streaming turn that emits the given text as deltas, then completes.
    pub async fn add_stream_text(&self, chunks: &[&str]) {
        let mut events: Vec<_> = chunks
            .iter()
            .map(|c| ModelStreamEvent::TextDelta((*c).to_string()))
            .collect();
        events.push(ModelStreamEvent::Completed {
            response_id: Some("resp_mock".into()),
        });
        self.streams.lock().await.push_back(Ok(events));
    }

    /// Queue a raw streaming turn.
    pub async fn add_stream_events(&self, events: Vec<ModelStreamEvent>) {
        self.streams.lock().await.push_back(Ok(events));
    }

    /// Queue a streaming turn that fails before producing anything.
    pub async fn add_stream_error(&self, message: &str) {
        self.streams.lock().await.push_back(Err(message.to_string()));
    }

    pub async fn add_completion(&self, text: &str) {
        self.completions.lock().await.push_back(Ok(text.to_string()));
    }

    pub async fn add_completion_error(&self, message: &str) {
        self.completions.lock().await.push_back(Err(message.to_string()));
    }

    /// Queue an upload result. Without one, uploads report the endpoint unavailable.
    pub async fn add_upload(&self, result: Result<&str, &str>) {
        self.uploads
            .lock()
            .await
            .push_back(result.map(str::to_string).map_err(str::to_string));
    }

    /// Every request seen by `complete` or `stream`, in call order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, request: ModelRequest) -> Result<String, TapbackError> {
        self.requests.lock().await.push(request);
        match self.completions.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(TapbackError::provider(message)),
            None => Ok("mock response".to_string()),
        }
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, TapbackError> {
        self.requests.lock().await.push(request);
        let events = match self.streams.lock().await.pop_front() {
            Some(Ok(events)) => events,
            Some(Err(message)) => return Err(TapbackError::provider(message)),
            None => vec![
                ModelStreamEvent::TextDelta("mock response".into()),
                ModelStreamEvent::Completed { response_id: None },
            ],
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn upload_file(&self, path: &Path) -> Result<String, TapbackError> {
        match self.uploads.lock().await.pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(message)) => Err(TapbackError::provider(message)),
            None => Err(TapbackError::ProviderUnavailable(format!(
                "uploads disabled for {}",
                path.display()
            ))),
        }
    }
}
