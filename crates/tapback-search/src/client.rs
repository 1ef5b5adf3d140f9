// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Tavily search API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tapback_core::settings::clamp_search_results;
use tapback_core::{SearchHit, SearchResponse, TapbackError, WebSearch};
use tracing::debug;

/// Base URL for the Tavily API.
const API_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: &'static str,
    include_images: bool,
    include_favicon: bool,
    country: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<ResultItem>,
}

#[derive(Debug, Deserialize)]
struct ResultItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Tavily-backed [`WebSearch`].
///
/// Without an API key the client still constructs, reports
/// `is_configured() == false`, and every search returns
/// [`TapbackError::SearchNotConfigured`].
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>) -> Result<Self, TapbackError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TapbackError::Search {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (config and wiremock tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, k: usize) -> Result<SearchResponse, TapbackError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResponse::default());
        }
        let Some(api_key) = &self.api_key else {
            return Err(TapbackError::SearchNotConfigured);
        };

        let num = clamp_search_results(k);
        let body = SearchRequest {
            query,
            max_results: num,
            search_depth: "basic",
            include_answer: "advanced",
            include_images: false,
            include_favicon: false,
            country: "united states",
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TapbackError::Search {
                message: format!("Tavily search error: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, query, k = num, "search response received");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TapbackError::Search {
                message: format!("Tavily search error: {status}: {text}"),
                source: None,
            });
        }

        let parsed: SearchResponseBody = response.json().await.map_err(|e| TapbackError::Search {
            message: format!("Tavily search error: malformed response: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(SearchResponse {
            answer: parsed.answer.unwrap_or_default(),
            results: parsed
                .results
                .into_iter()
                .take(num)
                .map(|item| SearchHit {
                    title: item.title.unwrap_or_default(),
                    url: item.url.unwrap_or_default(),
                    content: item.content.unwrap_or_default(),
                    score: item.score,
                })
                .collect(),
        })
    }
}
