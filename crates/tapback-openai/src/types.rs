// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI Responses and Chat Completions request types and SSE payloads.

use serde::{Deserialize, Serialize};

// --- Responses API ---

/// A request to `POST /responses`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    pub input: Vec<ResponsesInputItem>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,

    /// Chains a follow-up turn (tool outputs) onto an earlier response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,

    pub stream: bool,
}

/// One item of Responses API input.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputItem {
    /// A user message made of content parts.
    Message {
        role: &'static str,
        content: Vec<ResponsesContent>,
    },
    /// The result of a function call the model requested.
    FunctionCallOutput { call_id: String, output: String },
}

/// Content parts of a Responses API message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContent {
    InputText { text: String },
    InputImage { image_url: String },
    InputFile { file_id: String },
}

/// A function tool in the Responses API shape (name and parameters at top level).
#[derive(Debug, Clone, Serialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// --- Chat Completions API ---

/// A request to `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
}

/// Plain string content, or typed parts for multimodal messages.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

// --- Files API ---

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
}

// --- Errors ---

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

// --- SSE payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct SseTextDelta {
    #[serde(default)]
    pub delta: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseOutputItemAdded {
    pub item: SseOutputItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseOutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseArgumentsDelta {
    pub item_id: String,
    #[serde(default)]
    pub delta: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseArgumentsDone {
    pub item_id: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseResponseEnvelope {
    pub response: SseResponseRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseResponseRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseError {
    #[serde(default)]
    pub message: String,
}

/// A Chat Completions stream chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunkChoice {
    #[serde(default)]
    pub delta: ChatChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}
