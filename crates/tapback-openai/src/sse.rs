// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parsers for OpenAI streaming responses.
//!
//! Converts a reqwest response byte stream into [`ModelStreamEvent`]s using
//! the `eventsource-stream` crate. Unknown event types are skipped.

use std::collections::HashMap;

use eventsource_stream::Eventsource;
use futures::future;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use tapback_core::types::ModelStreamEvent;
use tapback_core::{ModelStream, TapbackError};

use crate::types::{
    ChatChunk, SseArgumentsDelta, SseArgumentsDone, SseError, SseOutputItemAdded,
    SseResponseEnvelope, SseTextDelta,
};

fn parse<T: DeserializeOwned>(kind: &str, data: &str) -> Result<T, TapbackError> {
    serde_json::from_str(data).map_err(|e| TapbackError::Provider {
        message: format!("failed to parse {kind}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Responses API events carry their type both as the SSE event name and in
/// the payload. Fall back to the payload when the name is absent.
fn event_type(name: &str, data: &str) -> String {
    if !name.is_empty() && name != "message" {
        return name.to_string();
    }
    serde_json::from_str::<serde_json::Value>(data)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_default()
}

/// Map one Responses API event. Argument events are keyed by output item id,
/// so `calls` remembers which `call_id` each function-call item belongs to.
fn map_responses_event(
    calls: &mut HashMap<String, String>,
    kind: &str,
    data: &str,
) -> Option<Result<ModelStreamEvent, TapbackError>> {
    let mapped = match kind {
        "response.output_text.delta" => parse::<SseTextDelta>(kind, data)
            .map(|d| ModelStreamEvent::TextDelta(d.delta)),
        "response.output_item.added" => {
            let added = match parse::<SseOutputItemAdded>(kind, data) {
                Ok(added) => added,
                Err(e) => return Some(Err(e)),
            };
            if added.item.item_type != "function_call" {
                return None;
            }
            let call_id = added.item.call_id.or(added.item.id.clone())?;
            if let Some(item_id) = added.item.id {
                calls.insert(item_id, call_id.clone());
            }
            Ok(ModelStreamEvent::ToolCallOpened {
                call_id,
                name: added.item.name.unwrap_or_default(),
            })
        }
        "response.function_call_arguments.delta" => {
            parse::<SseArgumentsDelta>(kind, data).map(|d| ModelStreamEvent::ToolCallArgumentsDelta {
                call_id: calls.get(&d.item_id).cloned().unwrap_or(d.item_id),
                delta: d.delta,
            })
        }
        "response.function_call_arguments.done" => {
            parse::<SseArgumentsDone>(kind, data).map(|d| ModelStreamEvent::ToolCallArgumentsDone {
                call_id: calls.remove(&d.item_id).unwrap_or(d.item_id),
                arguments: d.arguments,
            })
        }
        "response.completed" => parse::<SseResponseEnvelope>(kind, data)
            .map(|env| ModelStreamEvent::Completed { response_id: env.response.id }),
        "response.failed" => match parse::<SseResponseEnvelope>(kind, data) {
            Ok(env) => Err(TapbackError::provider(
                env.response
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "response failed".into()),
            )),
            Err(e) => Err(e),
        },
        "error" => match parse::<SseError>(kind, data) {
            Ok(err) => Err(TapbackError::provider(format!("OpenAI stream error: {}", err.message))),
            Err(e) => Err(e),
        },
        _ => return None,
    };
    Some(mapped)
}

/// Parse a streaming `POST /responses` body.
pub fn parse_responses_stream(response: reqwest::Response) -> ModelStream {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .scan(HashMap::new(), |calls, result| {
            let item = match result {
                Ok(event) => {
                    let kind = event_type(&event.event, &event.data);
                    map_responses_event(calls, &kind, &event.data)
                }
                Err(e) => Some(Err(TapbackError::provider(format!("SSE stream error: {e}")))),
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready);

    Box::pin(mapped)
}

/// Parse a streaming `POST /chat/completions` body. The `[DONE]` sentinel
/// becomes a [`ModelStreamEvent::Completed`] with no response id.
pub fn parse_chat_stream(response: reqwest::Response) -> ModelStream {
    let mapped = response.bytes_stream().eventsource().filter_map(|result| async move {
        match result {
            Ok(event) if event.data.trim() == "[DONE]" => {
                Some(Ok(ModelStreamEvent::Completed { response_id: None }))
            }
            Ok(event) => match parse::<ChatChunk>("chat chunk", &event.data) {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|d| !d.is_empty())
                    .map(|d| Ok(ModelStreamEvent::TextDelta(d))),
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(TapbackError::provider(format!("SSE stream error: {e}")))),
        }
    });

    Box::pin(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Serve raw SSE text through wiremock to get a real `reqwest::Response`.
    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    async fn collect(stream: ModelStream) -> Vec<Result<ModelStreamEvent, TapbackError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn text_deltas_then_completed() {
        let sse = concat!(
            "event: response.created\ndata: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_1\"}}\n\n",
            "event: response.output_text.delta\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n",
            "event: response.output_text.delta\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n",
            "event: response.completed\ndata: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_1\"}}\n\n",
        );
        let events: Vec<_> = collect(parse_responses_stream(mock_sse_response(sse).await))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            events,
            vec![
                ModelStreamEvent::TextDelta("Hel".into()),
                ModelStreamEvent::TextDelta("lo".into()),
                ModelStreamEvent::Completed { response_id: Some("resp_1".into()) },
            ]
        );
    }

    #[tokio::test]
    async fn function_call_arguments_are_keyed_by_call_id() {
        let sse = concat!(
            "data: {\"type\":\"response.output_item.added\",\"item\":{\"type\":\"function_call\",\"id\":\"fc_1\",\"call_id\":\"call_9\",\"name\":\"web_search\"}}\n\n",
            "data: {\"type\":\"response.function_call_arguments.delta\",\"item_id\":\"fc_1\",\"delta\":\"{\\\"query\\\":\"}\n\n",
            "data: {\"type\":\"response.function_call_arguments.done\",\"item_id\":\"fc_1\",\"arguments\":\"{\\\"query\\\":\\\"x\\\"}\"}\n\n",
        );
        let events: Vec<_> = collect(parse_responses_stream(mock_sse_response(sse).await))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            events,
            vec![
                ModelStreamEvent::ToolCallOpened { call_id: "call_9".into(), name: "web_search".into() },
                ModelStreamEvent::ToolCallArgumentsDelta { call_id: "call_9".into(), delta: "{\"query\":".into() },
                ModelStreamEvent::ToolCallArgumentsDone { call_id: "call_9".into(), arguments: "{\"query\":\"x\"}".into() },
            ]
        );
    }

    #[tokio::test]
    async fn unknown_events_and_message_items_are_skipped() {
        let sse = concat!(
            "event: response.in_progress\ndata: {}\n\n",
            "event: response.output_item.added\ndata: {\"item\":{\"type\":\"message\",\"id\":\"msg_1\"}}\n\n",
            "event: response.output_text.delta\ndata: {\"delta\":\"ok\"}\n\n",
        );
        let events = collect(parse_responses_stream(mock_sse_response(sse).await)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &ModelStreamEvent::TextDelta("ok".into()));
    }

    #[tokio::test]
    async fn error_event_surfaces_as_provider_error() {
        let sse = "event: error\ndata: {\"message\":\"overloaded\"}\n\n";
        let events = collect(parse_responses_stream(mock_sse_response(sse).await)).await;
        let err = events[0].as_ref().unwrap_err().to_string();
        assert!(err.contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn chat_stream_deltas_and_done() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let events: Vec<_> = collect(parse_chat_stream(mock_sse_response(sse).await))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            events,
            vec![
                ModelStreamEvent::TextDelta("4".into()),
                ModelStreamEvent::Completed { response_id: None },
            ]
        );
    }
}
