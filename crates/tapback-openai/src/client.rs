// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI API.
//!
//! Provides [`OpenAiClient`] which handles authentication, JSON and SSE
//! requests against the Responses and Chat Completions endpoints, file
//! uploads, and transient error retry.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use tapback_core::{ModelStream, TapbackError};
use tracing::{debug, warn};

use crate::sse;
use crate::types::{ApiErrorResponse, ChatRequest, FileObject, ResponsesRequest};

/// Base URL for the OpenAI API.
pub const API_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for OpenAI API communication.
///
/// Retries transient errors (429, 500, 503). A 404 or 405 means the
/// endpoint is not offered by this backend and maps to
/// [`TapbackError::ProviderUnavailable`] so callers can fall back.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str, max_retries: u32) -> Result<Self, TapbackError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| TapbackError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| TapbackError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// `POST /responses`, non-streaming.
    pub async fn create_response(&self, request: &ResponsesRequest) -> Result<serde_json::Value, TapbackError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.post_json("responses", &req).await?;
        read_json(response).await
    }

    /// `POST /responses` with `stream: true`.
    pub async fn stream_response(&self, request: &ResponsesRequest) -> Result<ModelStream, TapbackError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.post_json("responses", &req).await?;
        Ok(sse::parse_responses_stream(response))
    }

    /// `POST /chat/completions`, non-streaming.
    pub async fn create_chat(&self, request: &ChatRequest) -> Result<serde_json::Value, TapbackError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.post_json("chat/completions", &req).await?;
        read_json(response).await
    }

    /// `POST /chat/completions` with `stream: true`.
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<ModelStream, TapbackError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.post_json("chat/completions", &req).await?;
        Ok(sse::parse_chat_stream(response))
    }

    /// Upload a document with purpose `assistants` and return its file id.
    pub async fn upload_file(&self, path: &Path) -> Result<String, TapbackError> {
        let bytes = tokio::fs::read(path).await.map_err(TapbackError::storage)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str("application/pdf")
            .map_err(|e| TapbackError::provider(format!("invalid upload mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .client
            .post(self.url("files"))
            .multipart(form)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        debug!(status = %status, path = %path.display(), "file upload response received");
        if !status.is_success() {
            return Err(error_for(status, response).await);
        }
        let file: FileObject = read_typed(response).await?;
        Ok(file.id)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// POST a JSON body, retrying transient failures after a one-second delay.
    async fn post_json<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response, TapbackError> {
        let url = self.url(endpoint);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, endpoint, "retrying request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(request_failed)?;

            let status = response.status();
            debug!(status = %status, attempt, endpoint, "response received");

            if status.is_success() {
                return Ok(response);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(TapbackError::provider(format!("API returned {status}: {body}")));
                continue;
            }

            return Err(error_for(status, response).await);
        }

        Err(last_error.unwrap_or_else(|| TapbackError::provider("request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

fn request_failed(e: reqwest::Error) -> TapbackError {
    TapbackError::Provider {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Turn a non-success response into an error, preferring the API's own message.
async fn error_for(status: StatusCode, response: reqwest::Response) -> TapbackError {
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_err) => match api_err.error.type_ {
            Some(kind) => format!("OpenAI API error ({kind}): {}", api_err.error.message),
            None => format!("OpenAI API error: {}", api_err.error.message),
        },
        Err(_) => format!("API returned {status}: {body}"),
    };
    if matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) {
        return TapbackError::ProviderUnavailable(message);
    }
    TapbackError::provider(message)
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, TapbackError> {
    read_typed(response).await
}

async fn read_typed<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, TapbackError> {
    let body = response.text().await.map_err(|e| TapbackError::Provider {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| TapbackError::Provider {
        message: format!("failed to parse API response: {e}"),
        source: Some(Box::new(e)),
    })
}
