// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end dispatch testing.
//!
//! `TestHarness` assembles a complete [`Agent`] with in-memory stores and
//! mock adapters. [`TestHarness::poll`] drives one poll cycle and waits for
//! every reply it triggered.

use std::sync::Arc;

use tapback_agent::{Agent, AgentParts, AgentStores};
use tapback_config::model::AgentConfig;
use tapback_core::{AiSettings, ChatSource, ContactResolver};

use crate::contacts::CopyConverter;
use crate::memory_source::MemoryChatSource;
use crate::mock_provider::MockProvider;
use crate::mock_search::MockSearch;
use crate::mock_sender::MockSender;
use crate::recording_sink::RecordingSink;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    settings: AiSettings,
    config: AgentConfig,
    search: Option<MockSearch>,
    contacts: Option<Arc<dyn ContactResolver>>,
    source: Option<Arc<dyn ChatSource>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            settings: AiSettings::default(),
            config: AgentConfig::default(),
            search: None,
            contacts: None,
            source: None,
        }
    }

    /// Set the initial AI settings.
    pub fn with_settings(mut self, settings: AiSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Allow-list the given senders.
    pub fn allowing(mut self, users: &[&str]) -> Self {
        self.settings.allowed_users = users.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `search` instead of an unconfigured backend.
    pub fn with_search(mut self, search: MockSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_contacts(mut self, contacts: Arc<dyn ContactResolver>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Poll `source` instead of the harness's in-memory store.
    pub fn with_source(mut self, source: Arc<dyn ChatSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> TestHarness {
        let memory = Arc::new(MemoryChatSource::new());
        let provider = Arc::new(MockProvider::new());
        let sender = Arc::new(MockSender::new());
        let sink = Arc::new(RecordingSink::new());
        let search = Arc::new(self.search.unwrap_or_else(MockSearch::unconfigured));
        let source: Arc<dyn ChatSource> = self
            .source
            .unwrap_or_else(|| memory.clone() as Arc<dyn ChatSource>);

        let parts = AgentParts {
            source,
            sender: sender.clone(),
            provider: provider.clone(),
            search: search.clone(),
            sink: sink.clone(),
            converter: Arc::new(CopyConverter::failing()),
            contacts: self.contacts,
        };
        let agent = Agent::new(parts, AgentStores::in_memory(self.settings), self.config);

        TestHarness {
            agent,
            source: memory,
            provider,
            sender,
            sink,
            search,
        }
    }
}

/// A complete agent wired to mocks.
pub struct TestHarness {
    pub agent: Agent,
    /// The in-memory store. Unused when built with a custom source.
    pub source: Arc<MemoryChatSource>,
    pub provider: Arc<MockProvider>,
    pub sender: Arc<MockSender>,
    pub sink: Arc<RecordingSink>,
    pub search: Arc<MockSearch>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run one poll cycle and wait for the replies it spawned. Returns the
    /// number of messages fetched.
    pub async fn poll(&self) -> usize {
        let dispatcher = self.agent.dispatcher();
        let fetched = dispatcher.run_cycle().await;
        dispatcher.wait_idle().await;
        fetched
    }

    /// Texts delivered so far, in send order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sender
            .sent_messages()
            .await
            .into_iter()
            .map(|(text, _)| text)
            .collect()
    }
}
