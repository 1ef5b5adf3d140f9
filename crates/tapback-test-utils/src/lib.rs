// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tapback integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without Messages.app, OpenAI, or Tavily.
//!
//! # Components
//!
//! - [`MockProvider`] - Model backend with scripted streams and completions
//! - [`MockSender`] - Captures outbound sends
//! - [`MockSearch`] - Web search backend counting live calls
//! - [`RecordingSink`] - Records emitted agent events
//! - [`MemoryChatSource`] - Chat store populated directly by tests
//! - [`FixtureChatDb`] - On-disk chat.db with the Messages schema subset
//! - [`TestHarness`] - A full agent wired to the mocks above

pub mod contacts;
pub mod fixture;
pub mod harness;
pub mod memory_source;
pub mod mock_provider;
pub mod mock_search;
pub mod mock_sender;
pub mod recording_sink;

pub use contacts::{CopyConverter, StaticContacts};
pub use fixture::{FixtureChatDb, typedstream_body};
pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_source::MemoryChatSource;
pub use mock_provider::MockProvider;
pub use mock_search::MockSearch;
pub use mock_sender::MockSender;
pub use recording_sink::RecordingSink;
