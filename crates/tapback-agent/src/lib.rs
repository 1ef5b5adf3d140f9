// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polling loop, response engine, and scheduling for the Tapback agent.
//!
//! The [`Dispatcher`] is the central coordinator that:
//! - Polls the chat store for messages newer than the [`Watermark`]
//! - Logs every message and publishes it to observers
//! - Detects trigger commands from allow-listed senders
//! - Routes each command to image, document, mention, or chat handling
//! - Delivers replies through the serialized [`Outbox`]
//!
//! [`Agent`] assembles those pieces with the scheduler and audit log and
//! exposes the administrative operations.

pub mod agent;
pub mod audit;
pub mod context;
pub mod dispatch;
pub mod documents;
pub mod engine;
pub mod events;
pub mod intent;
pub mod media;
pub mod mention;
pub mod outbox;
pub mod scheduler;
pub mod shutdown;
pub mod toolcall;
pub mod trigger;
pub mod watermark;

pub use agent::{Agent, AgentParts, AgentStores};
pub use audit::AuditLog;
pub use dispatch::Dispatcher;
pub use engine::{ResponseEngine, StreamContext};
pub use events::BroadcastSink;
pub use intent::{Intent, classify, infer_requested_count};
pub use outbox::Outbox;
pub use scheduler::{ScheduleBook, ScheduledMessage};
pub use shutdown::install_signal_handler;
pub use trigger::{extract_command, parse_mentions};
pub use watermark::Watermark;
