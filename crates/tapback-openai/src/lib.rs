// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider adapter for the Tapback agent.
//!
//! This crate implements [`ModelProvider`] against the OpenAI Responses API,
//! falling back to Chat Completions when the backend does not offer
//! `/responses`. Streaming uses SSE in both cases.

pub mod client;
pub mod extract;
pub mod sse;
pub mod types;

use std::path::Path;

use async_trait::async_trait;
use tapback_core::types::{InputPart, ModelRequest};
use tapback_core::{ModelProvider, ModelStream, TapbackError};
use tracing::{info, warn};

use crate::client::OpenAiClient;
use crate::types::{
    ChatContent, ChatMessage, ChatPart, ChatRequest, FunctionTool, ImageUrl, ResponsesContent,
    ResponsesInputItem, ResponsesRequest,
};

pub use extract::extract_text;

/// OpenAI provider implementing [`ModelProvider`].
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Creates a provider. Fails when no API key is configured.
    pub fn new(api_key: Option<&str>, base_url: &str, max_retries: u32) -> Result<Self, TapbackError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TapbackError::Config(
                    "OpenAI API key not found: set openai.api_key or OPENAI_API_KEY".into(),
                )
            })?;
        let client = OpenAiClient::new(api_key, base_url, max_retries)?;
        info!(base_url, "OpenAI provider initialized");
        Ok(Self { client })
    }

    async fn complete_via_chat(&self, request: &ModelRequest) -> Result<String, TapbackError> {
        let body = self.client.create_chat(&to_chat_request(request)?).await?;
        Ok(extract_text(&body))
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, request: ModelRequest) -> Result<String, TapbackError> {
        match self.client.create_response(&to_responses_request(&request)).await {
            Ok(body) => {
                let text = extract_text(&body);
                if text.is_empty() {
                    warn!("response carried no output text");
                }
                Ok(text)
            }
            Err(TapbackError::ProviderUnavailable(reason)) => {
                warn!(%reason, "Responses API unavailable, using chat completions");
                self.complete_via_chat(&request).await
            }
            Err(e) => Err(e),
        }
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, TapbackError> {
        match self.client.stream_response(&to_responses_request(&request)).await {
            Err(TapbackError::ProviderUnavailable(reason)) if request.continuation.is_none() => {
                warn!(%reason, "Responses API unavailable, streaming chat completions");
                self.client.stream_chat(&to_chat_request(&request)?).await
            }
            other => other,
        }
    }

    async fn upload_file(&self, path: &Path) -> Result<String, TapbackError> {
        self.client.upload_file(path).await
    }
}

/// Convert a backend-neutral request to the Responses API shape.
fn to_responses_request(request: &ModelRequest) -> ResponsesRequest {
    let (input, previous_response_id) = match &request.continuation {
        Some(cont) => (
            cont.outputs
                .iter()
                .map(|o| ResponsesInputItem::FunctionCallOutput {
                    call_id: o.call_id.clone(),
                    output: o.output.clone(),
                })
                .collect(),
            Some(cont.previous_response_id.clone()),
        ),
        None => {
            let content = request
                .input
                .iter()
                .map(|part| match part {
                    InputPart::Text { text } => ResponsesContent::InputText { text: text.clone() },
                    InputPart::Image { data_url } => ResponsesContent::InputImage {
                        image_url: data_url.clone(),
                    },
                    InputPart::File { file_id } => ResponsesContent::InputFile {
                        file_id: file_id.clone(),
                    },
                })
                .collect();
            (vec![ResponsesInputItem::Message { role: "user", content }], None)
        }
    };

    ResponsesRequest {
        model: request.model.clone(),
        instructions: request.instructions.clone(),
        input,
        tools: request
            .tools
            .iter()
            .map(|t| FunctionTool {
                tool_type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
        previous_response_id,
        stream: false,
    }
}

/// Convert to Chat Completions. Tools are not offered on this path, and
/// file references cannot be expressed at all.
fn to_chat_request(request: &ModelRequest) -> Result<ChatRequest, TapbackError> {
    if request.continuation.is_some() {
        return Err(TapbackError::ProviderUnavailable(
            "tool continuation requires the Responses API".into(),
        ));
    }

    let mut parts = Vec::with_capacity(request.input.len());
    for part in &request.input {
        match part {
            InputPart::Text { text } => parts.push(ChatPart::Text { text: text.clone() }),
            InputPart::Image { data_url } => parts.push(ChatPart::ImageUrl {
                image_url: ImageUrl { url: data_url.clone() },
            }),
            InputPart::File { .. } => {
                return Err(TapbackError::ProviderUnavailable(
                    "file inputs require the Responses API".into(),
                ));
            }
        }
    }

    let content = match parts.as_slice() {
        [ChatPart::Text { text }] => ChatContent::Text(text.clone()),
        _ => ChatContent::Parts(parts),
    };

    let mut messages = Vec::with_capacity(2);
    if let Some(instructions) = &request.instructions {
        messages.push(ChatMessage {
            role: "system",
            content: ChatContent::Text(instructions.clone()),
        });
    }
    messages.push(ChatMessage { role: "user", content });

    Ok(ChatRequest {
        model: request.model.clone(),
        messages,
        stream: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tapback_core::types::{Continuation, ModelStreamEvent, ToolOutput, ToolSpec};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(Some("sk-test"), &server.uri(), 0).unwrap()
    }

    fn text_request() -> ModelRequest {
        ModelRequest::text("gpt-4o-mini", "be brief", "what's 2+2")
    }

    #[test]
    fn missing_key_is_config_error() {
        let err = OpenAiProvider::new(None, client::API_BASE_URL, 1).err().unwrap();
        assert!(matches!(err, TapbackError::Config(_)));
        assert!(OpenAiProvider::new(Some(" "), client::API_BASE_URL, 1).is_err());
    }

    #[test]
    fn continuation_becomes_function_call_outputs() {
        let mut request = text_request();
        request.tools.push(ToolSpec {
            name: "web_search".into(),
            description: "search".into(),
            parameters: serde_json::json!({"type": "object"}),
        });
        request.continuation = Some(Continuation {
            previous_response_id: "resp_1".into(),
            outputs: vec![ToolOutput { call_id: "call_1".into(), output: "{}".into() }],
        });

        let json = serde_json::to_value(to_responses_request(&request)).unwrap();
        assert_eq!(json["previous_response_id"], "resp_1");
        assert_eq!(json["input"][0]["type"], "function_call_output");
        assert_eq!(json["input"][0]["call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["name"], "web_search");
    }

    #[test]
    fn chat_request_rejects_files() {
        let mut request = text_request();
        request.input.push(InputPart::File { file_id: "file-1".into() });
        assert!(matches!(
            to_chat_request(&request),
            Err(TapbackError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn complete_uses_responses_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "instructions": "be brief",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "resp_1",
                "output": [{"type": "message", "content": [{"type": "output_text", "text": "4"}]}]
            })))
            .mount(&server)
            .await;

        assert_eq!(provider(&server).complete(text_request()).await.unwrap(), "4");
    }

    #[tokio::test]
    async fn complete_falls_back_to_chat_when_responses_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "system", "content": "be brief"}, {"role": "user", "content": "what's 2+2"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "4"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(provider(&server).complete(text_request()).await.unwrap(), "4");
    }

    #[tokio::test]
    async fn stream_falls_back_to_chat_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: {\"choices\":[{\"delta\":{\"content\":\"hey\"}}]}\n\ndata: [DONE]\n\n"),
            )
            .mount(&server)
            .await;

        let events: Vec<_> = provider(&server)
            .stream(text_request())
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(events[0], ModelStreamEvent::TextDelta("hey".into()));
    }
}
