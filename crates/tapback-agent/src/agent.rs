// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled agent and its administrative operations.
//!
//! [`Agent`] wires adapters, persistent stores, the response engine, and
//! the dispatcher together. The binary builds one from config; tests build
//! one from in-memory stores and mocks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tapback_config::SettingsStore;
use tapback_config::model::{AgentConfig, TapbackConfig};
use tapback_core::{
    AiSettings, AiSettingsPatch, AuditEntry, ChatSource, ContactResolver, EventSink,
    HealthReport, MediaConverter, MessageSender, ModelProvider, OutboundTarget, SettingsProvider,
    TapbackError, WebSearch, normalize_handle,
};
use tapback_search::CachedSearch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::dispatch::Dispatcher;
use crate::engine::ResponseEngine;
use crate::outbox::Outbox;
use crate::scheduler::{ScheduleBook, ScheduledMessage, run_scheduler};
use crate::watermark::Watermark;

/// How long shutdown waits for replies that are still being generated.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The adapters an agent runs on.
pub struct AgentParts {
    pub source: Arc<dyn ChatSource>,
    pub sender: Arc<dyn MessageSender>,
    pub provider: Arc<dyn ModelProvider>,
    pub search: Arc<dyn WebSearch>,
    pub sink: Arc<dyn EventSink>,
    pub converter: Arc<dyn MediaConverter>,
    pub contacts: Option<Arc<dyn ContactResolver>>,
}

/// State that outlives a single run: settings, watermark, and schedule.
pub struct AgentStores {
    pub settings: Arc<SettingsStore>,
    pub watermark: Arc<Watermark>,
    pub schedule: Arc<ScheduleBook>,
}

impl AgentStores {
    /// Stores with no persistence, starting from `settings`.
    pub fn in_memory(settings: AiSettings) -> Self {
        Self {
            settings: Arc::new(SettingsStore::in_memory(settings)),
            watermark: Arc::new(Watermark::in_memory(0)),
            schedule: Arc::new(ScheduleBook::in_memory()),
        }
    }

    /// File-backed stores under the configured support directory. The
    /// `[settings]` table seeds the settings file on first run.
    pub fn open(config: &TapbackConfig) -> Self {
        let imessage = &config.imessage;
        Self {
            settings: Arc::new(SettingsStore::open(
                imessage.settings_path(),
                config.settings.clone(),
            )),
            watermark: Arc::new(Watermark::load(imessage.state_path())),
            schedule: Arc::new(ScheduleBook::open(imessage.schedule_path())),
        }
    }
}

/// A fully wired agent.
pub struct Agent {
    config: AgentConfig,
    source: Arc<dyn ChatSource>,
    settings: Arc<SettingsStore>,
    watermark: Arc<Watermark>,
    schedule: Arc<ScheduleBook>,
    audit: Arc<AuditLog>,
    outbox: Arc<Outbox>,
    dispatcher: Arc<Dispatcher>,
}

impl Agent {
    pub fn new(parts: AgentParts, stores: AgentStores, config: AgentConfig) -> Self {
        let AgentParts {
            source,
            sender,
            provider,
            search,
            sink,
            converter,
            contacts,
        } = parts;

        let mut audit = AuditLog::new(config.audit_log_capacity, Arc::clone(&sink));
        if let Some(contacts) = contacts {
            audit = audit.with_contacts(contacts);
        }
        let audit = Arc::new(audit);
        let outbox = Arc::new(Outbox::new(sender, Arc::clone(&audit), Arc::clone(&sink)));
        let engine = Arc::new(
            ResponseEngine::new(
                provider,
                Arc::clone(&source),
                Arc::new(CachedSearch::new(search)),
                Arc::clone(&sink),
                converter,
            )
            .with_timeout(Duration::from_secs(config.request_timeout_secs.max(1))),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&source),
            stores.settings.clone(),
            engine,
            Arc::clone(&stores.watermark),
            Arc::clone(&audit),
            Arc::clone(&outbox),
            sink,
        ));

        Self {
            config,
            source,
            settings: stores.settings,
            watermark: stores.watermark,
            schedule: stores.schedule,
            audit,
            outbox,
            dispatcher,
        }
    }

    /// Build an agent with file-backed stores from `config`.
    pub fn from_config(config: &TapbackConfig, parts: AgentParts) -> Self {
        Self::new(parts, AgentStores::open(config), config.agent.clone())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The current settings snapshot.
    pub fn settings(&self) -> Arc<AiSettings> {
        self.settings.snapshot()
    }

    /// Apply a partial settings update. Later poll cycles see the new values.
    pub fn update_ai_settings(&self, patch: AiSettingsPatch) -> Result<Arc<AiSettings>, TapbackError> {
        let updated = self.settings.update(patch)?;
        info!(model = %updated.model, tag = %updated.trigger_tag, "AI settings updated");
        Ok(updated)
    }

    /// Replace the allow-list. An empty list denies everyone.
    pub fn set_allowed_users<S: AsRef<str>>(&self, users: &[S]) -> Result<Arc<AiSettings>, TapbackError> {
        let updated = self.settings.set_allowed_users(users)?;
        info!(count = updated.allowed_users.len(), "allow-list updated");
        Ok(updated)
    }

    /// Send `text` to a chat or a phone. The chat wins when both are given;
    /// the phone then only labels the audit entry.
    pub async fn send_message(
        &self,
        text: &str,
        phone: Option<&str>,
        chat_guid: Option<&str>,
    ) -> Result<(), TapbackError> {
        if text.trim().is_empty() {
            return Err(TapbackError::InvalidInput("message is required".into()));
        }
        let target = OutboundTarget::from_parts(phone, chat_guid).ok_or_else(|| {
            TapbackError::InvalidInput("either a phone number or a chat is required".into())
        })?;
        let label = match &target {
            OutboundTarget::Phone(handle) => Some(handle.clone()),
            OutboundTarget::Chat(_) => phone.map(normalize_handle).filter(|p| !p.is_empty()),
        };
        self.outbox.deliver(text, &target, label.as_deref()).await
    }

    /// Schedule `message` to `phone` every day at `time` (`HH:MM`, local).
    pub fn schedule_message(
        &self,
        time: &str,
        phone: &str,
        message: &str,
    ) -> Result<ScheduledMessage, TapbackError> {
        self.schedule.schedule(time, phone, message, Local::now().naive_local())
    }

    pub fn remove_scheduled_message(&self, id: &str) -> Result<bool, TapbackError> {
        self.schedule.remove(id)
    }

    pub fn get_scheduled_messages(&self) -> Vec<ScheduledMessage> {
        self.schedule.list()
    }

    /// The most recent audit entries, oldest first.
    pub fn get_message_log(&self, limit: Option<usize>) -> Vec<AuditEntry> {
        self.audit.get_message_log(limit)
    }

    pub async fn health(&self) -> HealthReport {
        let reachability = self.source.check_reachability().await;
        let source_ok = reachability.is_ok();
        HealthReport {
            ok: source_ok,
            source_ok,
            source_error: reachability.err().map(|e| e.to_string()),
            last_seen_timestamp: self.watermark.get(),
        }
    }

    /// Set the first-run watermark from the newest stored message so the
    /// backlog is skipped unless replay is configured.
    pub async fn initialize(&self) -> Result<(), TapbackError> {
        if self.watermark.get() != 0 || self.config.replay_history {
            return Ok(());
        }
        match self.source.latest_timestamp().await {
            Ok(latest) => self.watermark.initialize_if_empty(latest, false),
            Err(e) => {
                warn!(error = %e, "cannot read latest message, starting from an empty watermark");
                Ok(())
            }
        }
    }

    /// Run the scheduler and the poll loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), TapbackError> {
        self.initialize().await?;
        info!(
            name = %self.config.name,
            last_seen = self.watermark.get(),
            replay = self.config.replay_history,
            "agent starting"
        );

        let scheduler = tokio::spawn(run_scheduler(
            Arc::clone(&self.schedule),
            Arc::clone(&self.outbox),
            Duration::from_secs(self.config.scheduler_interval_secs.max(1)),
            cancel.clone(),
        ));

        self.dispatcher
            .run(
                Duration::from_secs(self.config.poll_interval_secs.max(1)),
                DRAIN_TIMEOUT,
                cancel,
            )
            .await;

        if let Err(e) = scheduler.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
        info!("agent stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapback_core::ConversationKind;
    use tapback_test_utils::{
        CopyConverter, MemoryChatSource, MockProvider, MockSearch, MockSender, RecordingSink,
    };

    struct Fixture {
        agent: Agent,
        source: Arc<MemoryChatSource>,
        sender: Arc<MockSender>,
    }

    fn fixture(config: AgentConfig) -> Fixture {
        let source = Arc::new(MemoryChatSource::new());
        let sender = Arc::new(MockSender::new());
        let parts = AgentParts {
            source: source.clone(),
            sender: sender.clone(),
            provider: Arc::new(MockProvider::new()),
            search: Arc::new(MockSearch::unconfigured()),
            sink: Arc::new(RecordingSink::new()),
            converter: Arc::new(CopyConverter::failing()),
            contacts: None,
        };
        let agent = Agent::new(parts, AgentStores::in_memory(AiSettings::default()), config);
        Fixture {
            agent,
            source,
            sender,
        }
    }

    #[tokio::test]
    async fn send_message_requires_a_target_and_text() {
        let f = fixture(AgentConfig::default());
        assert!(matches!(
            f.agent.send_message("hi", None, None).await,
            Err(TapbackError::InvalidInput(_))
        ));
        assert!(matches!(
            f.agent.send_message("  ", Some("+1555"), None).await,
            Err(TapbackError::InvalidInput(_))
        ));
        assert_eq!(f.sender.sent_count().await, 0);
    }

    #[tokio::test]
    async fn send_message_normalizes_phone_and_prefers_chat() {
        let f = fixture(AgentConfig::default());
        f.agent
            .send_message("one", Some("+1 (555) 000-1111"), None)
            .await
            .unwrap();
        f.agent
            .send_message("two", Some("+1 555 000 1111"), Some("iMessage;+;chat1"))
            .await
            .unwrap();

        let sent = f.sender.sent_messages().await;
        assert_eq!(sent[0].1, OutboundTarget::Phone("+15550001111".into()));
        assert_eq!(sent[1].1, OutboundTarget::Chat("iMessage;+;chat1".into()));

        let log = f.agent.get_message_log(None);
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.phone == "+15550001111"));
    }

    #[tokio::test]
    async fn initialize_skips_backlog_unless_replaying() {
        let f = fixture(AgentConfig::default());
        f.source.push("chat1", ConversationKind::Individual, "+1555", "old", 700);
        f.agent.initialize().await.unwrap();
        assert_eq!(f.agent.health().await.last_seen_timestamp, 700);

        let replay = fixture(AgentConfig {
            replay_history: true,
            ..AgentConfig::default()
        });
        replay.source.push("chat1", ConversationKind::Individual, "+1555", "old", 700);
        replay.agent.initialize().await.unwrap();
        assert_eq!(replay.agent.health().await.last_seen_timestamp, 0);
    }

    #[tokio::test]
    async fn health_reports_unreachable_store() {
        let f = fixture(AgentConfig::default());
        assert!(f.agent.health().await.ok);

        f.source.set_unreachable(true);
        let report = f.agent.health().await;
        assert!(!report.ok);
        assert!(!report.source_ok);
        assert!(report.source_error.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn settings_updates_are_visible() {
        let f = fixture(AgentConfig::default());
        f.agent
            .update_ai_settings(AiSettingsPatch {
                context_window: Some(500),
                ..AiSettingsPatch::default()
            })
            .unwrap();
        f.agent.set_allowed_users(&["+1 (555) 000-1111", "+15550001111"]).unwrap();

        let settings = f.agent.settings();
        assert_eq!(settings.context_window, 100);
        assert_eq!(settings.allowed_users, vec!["+15550001111".to_string()]);
    }

    #[tokio::test]
    async fn schedule_round_trip() {
        let f = fixture(AgentConfig::default());
        let entry = f.agent.schedule_message("08:15", "+15550001111", "morning").unwrap();
        assert_eq!(f.agent.get_scheduled_messages(), vec![entry.clone()]);
        assert!(f.agent.remove_scheduled_message(&entry.id).unwrap());
        assert!(f.agent.get_scheduled_messages().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let f = fixture(AgentConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        f.agent.run(cancel).await.unwrap();
    }
}
