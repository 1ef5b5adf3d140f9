// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tapback iMessage agent.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Tapback workspace. Chat stores, model
//! backends, search backends, and delivery mechanisms all plug in through
//! the traits defined here.

pub mod error;
pub mod identity;
pub mod settings;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TapbackError;
pub use identity::{normalize_handle, normalize_phone};
pub use settings::{AiSettings, AiSettingsPatch};
pub use types::{
    AgentEvent, AttachmentKind, AuditEntry, ConversationKind, Direction, HealthReport, Message,
    OutboundTarget, Participant, SearchHit, SearchResponse, StreamPayload,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    ChatSource, ContactResolver, EventSink, MediaConverter, MessageSender, ModelProvider,
    ModelStream, SettingsProvider, WebSearch,
};
