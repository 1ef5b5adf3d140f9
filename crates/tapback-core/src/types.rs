// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the reader, the response engine, and the dispatch loop.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether a conversation is 1:1 or a group, derived from its participant count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Individual,
    Group,
    #[default]
    Unknown,
}

impl ConversationKind {
    /// Classify from the number of handles joined to the chat.
    pub fn from_participant_count(count: i64) -> Self {
        match count {
            n if n <= 0 => Self::Unknown,
            1 => Self::Individual,
            _ => Self::Group,
        }
    }
}

/// One row of the chat store. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Conversation GUID, absent for orphaned rows.
    pub chat_guid: Option<String>,
    pub kind: ConversationKind,
    pub is_from_me: bool,
    /// Sender address exactly as stored.
    pub sender: String,
    /// `sender` passed through [`crate::identity::normalize_handle`].
    pub handle: String,
    pub text: String,
    /// Raw platform timestamp (nanoseconds since 2001-01-01 on macOS).
    pub timestamp: i64,
    pub service: Option<String>,
}

/// A conversation member with a best-effort display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub handle: String,
    pub name: Option<String>,
}

impl Participant {
    /// Display name if known, the handle otherwise.
    pub fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.handle)
    }
}

/// Where an outbound reply is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundTarget {
    /// A single buddy, addressed by normalized handle.
    Phone(String),
    /// A conversation, addressed by chat GUID.
    Chat(String),
}

impl OutboundTarget {
    /// Build a target from optional phone and chat fields. Chat wins when both are set.
    pub fn from_parts(phone: Option<&str>, chat_guid: Option<&str>) -> Option<Self> {
        match (phone.filter(|p| !p.trim().is_empty()), chat_guid.filter(|c| !c.is_empty())) {
            (_, Some(chat)) => Some(Self::Chat(chat.to_string())),
            (Some(phone), None) => Some(Self::Phone(crate::identity::normalize_handle(phone))),
            (None, None) => None,
        }
    }
}

/// Attachment categories usable by specialized handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
}

/// Direction of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Direction {
    Received,
    Sent,
}

/// One entry in the in-memory audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub phone: String,
    pub contact: String,
    pub message: String,
    pub direction: Direction,
}

/// A single web search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Normalized search payload: a synthesized answer plus ranked sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    /// True when neither an answer nor any result came back.
    pub fn is_empty(&self) -> bool {
        self.answer.trim().is_empty() && self.results.is_empty()
    }
}

/// Payload of an `ai_stream` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPayload {
    Delta { delta: String },
    Done { text: String },
    Error { error: String },
}

/// Fire-and-forget events published to live observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// An inbound message was observed, or a reply was produced for one.
    NewMessage {
        phone: String,
        message: String,
        chat_type: ConversationKind,
        chat_guid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    /// An outbound message was delivered.
    MessageSent {
        phone: String,
        message: String,
        chat_type: ConversationKind,
        chat_guid: Option<String>,
    },
    /// The audit log changed.
    UpdateAnalytics { log: Vec<AuditEntry> },
    /// Incremental model output for one triggered command.
    AiStream {
        phone: String,
        chat_guid: Option<String>,
        payload: StreamPayload,
    },
    /// A condition needing operator attention, such as an unreadable chat store.
    AgentError {
        kind: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl AgentEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::MessageSent { .. } => "message_sent",
            Self::UpdateAnalytics { .. } => "update_analytics",
            Self::AiStream { .. } => "ai_stream",
            Self::AgentError { .. } => "agent_error",
        }
    }
}

/// Snapshot returned by the health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub source_ok: bool,
    pub source_error: Option<String>,
    pub last_seen_timestamp: i64,
}

// --- Model backend types ---

/// One piece of model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    Text { text: String },
    /// An image as a `data:` URL.
    Image { data_url: String },
    /// A document previously uploaded to the backend.
    File { file_id: String },
}

impl InputPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A function tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Result of executing one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: String,
}

/// Resumes a streaming session after tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    pub previous_response_id: String,
    pub outputs: Vec<ToolOutput>,
}

/// Backend-neutral model request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub instructions: Option<String>,
    pub input: Vec<InputPart>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub continuation: Option<Continuation>,
}

impl ModelRequest {
    /// A plain text request with a system prompt.
    pub fn text(model: impl Into<String>, instructions: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions: Some(instructions.into()),
            input: vec![InputPart::text(text)],
            tools: Vec::new(),
            continuation: None,
        }
    }
}

/// Events produced by a streaming model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStreamEvent {
    /// Incremental output text.
    TextDelta(String),
    /// The model opened a function call.
    ToolCallOpened { call_id: String, name: String },
    /// A fragment of a function call's JSON arguments.
    ToolCallArgumentsDelta { call_id: String, delta: String },
    /// The function call's arguments are final.
    ToolCallArgumentsDone { call_id: String, arguments: String },
    /// The response finished. `response_id` allows tool-output continuation.
    Completed { response_id: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_kind_from_participant_count() {
        assert_eq!(ConversationKind::from_participant_count(0), ConversationKind::Unknown);
        assert_eq!(ConversationKind::from_participant_count(1), ConversationKind::Individual);
        assert_eq!(ConversationKind::from_participant_count(3), ConversationKind::Group);
    }

    #[test]
    fn target_prefers_chat_and_normalizes_phone() {
        assert_eq!(
            OutboundTarget::from_parts(Some("+1 (555) 000-1111"), None),
            Some(OutboundTarget::Phone("+15550001111".into()))
        );
        assert_eq!(
            OutboundTarget::from_parts(Some("+1555"), Some("iMessage;+;chat1")),
            Some(OutboundTarget::Chat("iMessage;+;chat1".into()))
        );
        assert_eq!(OutboundTarget::from_parts(Some("  "), None), None);
    }

    #[test]
    fn events_serialize_with_wire_names() {
        let event = AgentEvent::AiStream {
            phone: "+1555".into(),
            chat_guid: None,
            payload: StreamPayload::Delta { delta: "hi".into() },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ai_stream");
        assert_eq!(json["payload"]["type"], "delta");
        assert_eq!(event.name(), "ai_stream");
    }

    #[test]
    fn health_report_uses_camel_case() {
        let report = HealthReport {
            ok: false,
            source_ok: false,
            source_error: Some("denied".into()),
            last_seen_timestamp: 7,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sourceOk"], false);
        assert_eq!(json["lastSeenTimestamp"], 7);
    }
}
