// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock web search backend counting live calls.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tapback_core::{SearchHit, SearchResponse, TapbackError, WebSearch};

pub struct MockSearch {
    configured: bool,
    response: Mutex<Result<SearchResponse, String>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockSearch {
    /// A configured backend returning `response` for every query.
    pub fn returning(response: SearchResponse) -> Self {
        Self {
            configured: true,
            response: Mutex::new(Ok(response)),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A configured backend with one answer and one source.
    pub fn with_answer(answer: &str) -> Self {
        Self::returning(SearchResponse {
            answer: answer.to_string(),
            results: vec![SearchHit {
                title: "Example".into(),
                url: "https://example.com".into(),
                content: "snippet".into(),
                score: Some(0.9),
            }],
        })
    }

    /// A backend with no credential.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::returning(SearchResponse::default())
        }
    }

    /// A configured backend whose calls fail upstream.
    pub fn failing(message: &str) -> Self {
        Self {
            configured: true,
            response: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Number of live searches performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(&self, query: &str, k: usize) -> Result<SearchResponse, TapbackError> {
        if !self.configured {
            return Err(TapbackError::SearchNotConfigured);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), k));
        }
        let response = self
            .response
            .lock()
            .map_err(|_| TapbackError::Internal("mock search poisoned".into()))?;
        match &*response {
            Ok(r) => Ok(r.clone()),
            Err(message) => Err(TapbackError::Search {
                message: message.clone(),
                source: None,
            }),
        }
    }
}
