// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The poll loop.
//!
//! Each cycle fetches messages newer than the watermark, logs and emits
//! every one, and hands triggered commands from allow-listed senders to
//! their own task. Reply generation therefore never delays detection of
//! later messages, while [`Outbox`] keeps the sends themselves serialized.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tapback_core::{
    AgentEvent, AiSettings, AttachmentKind, ChatSource, ConversationKind, Direction, EventSink,
    Message, OutboundTarget, SettingsProvider, TapbackError,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::engine::{ResponseEngine, StreamContext};
use crate::intent::{Intent, infer_requested_count, route_candidates};
use crate::mention::{disambiguation_prompt, mention_context, resolve_mentions};
use crate::outbox::Outbox;
use crate::trigger::{extract_command, parse_mentions};
use crate::watermark::Watermark;

const FULL_DISK_ACCESS_HINT: &str = "Cannot open the Messages database. Grant Full Disk Access to \
     the process running the agent in System Settings → Privacy & Security → Full Disk Access.";

/// Drives poll cycles and owns the in-flight command tasks.
pub struct Dispatcher {
    source: Arc<dyn ChatSource>,
    settings: Arc<dyn SettingsProvider>,
    engine: Arc<ResponseEngine>,
    watermark: Arc<Watermark>,
    audit: Arc<AuditLog>,
    outbox: Arc<Outbox>,
    sink: Arc<dyn EventSink>,
    tasks: TaskTracker,
    source_down: AtomicBool,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ChatSource>,
        settings: Arc<dyn SettingsProvider>,
        engine: Arc<ResponseEngine>,
        watermark: Arc<Watermark>,
        audit: Arc<AuditLog>,
        outbox: Arc<Outbox>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            source,
            settings,
            engine,
            watermark,
            audit,
            outbox,
            sink,
            tasks: TaskTracker::new(),
            source_down: AtomicBool::new(false),
        }
    }

    /// Poll every `interval` until `cancel` fires, then wait up to
    /// `drain_timeout` for in-flight replies.
    pub async fn run(&self, interval: Duration, drain_timeout: Duration, cancel: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "poll loop running");
        loop {
            self.run_cycle().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping poll loop");
                    break;
                }
            }
        }
        self.drain(drain_timeout).await;
        info!("poll loop stopped");
    }

    /// One poll: fetch, process, and persist the watermark. Returns the
    /// number of messages fetched. Command tasks may still be running when
    /// this returns; see [`Dispatcher::wait_idle`].
    pub async fn run_cycle(&self) -> usize {
        let settings = self.settings.snapshot();
        let messages = match self.source.fetch_new_messages(self.watermark.get()).await {
            Ok(messages) => {
                if self.source_down.swap(false, Ordering::AcqRel) {
                    info!("message store reachable again");
                }
                messages
            }
            Err(e) => {
                self.report_source_error(&e);
                return 0;
            }
        };

        let mut advanced = false;
        for message in &messages {
            advanced |= self.watermark.advance(message.timestamp);
            self.handle_message(&settings, message);
        }
        if advanced && let Err(e) = self.watermark.save() {
            warn!(error = %e, "failed to persist watermark");
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), last_seen = self.watermark.get(), "poll cycle");
        }
        messages.len()
    }

    /// Wait for every command task spawned so far.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    async fn drain(&self, timeout: Duration) {
        if self.tasks.is_empty() {
            return;
        }
        info!(count = self.tasks.len(), "waiting for in-flight replies");
        self.tasks.close();
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_err() {
            warn!(remaining = self.tasks.len(), "drain timeout reached, replies interrupted");
        }
    }

    fn handle_message(&self, settings: &Arc<AiSettings>, message: &Message) {
        let handle = message.handle.as_str();
        if handle.is_empty() || message.text.is_empty() {
            return;
        }

        info!(from = %handle, chat = ?message.chat_guid, kind = %message.kind, "message received");
        self.audit.append(handle, &message.text, Direction::Received);
        self.sink.emit(AgentEvent::NewMessage {
            phone: handle.to_string(),
            message: message.text.clone(),
            chat_type: message.kind,
            chat_guid: message.chat_guid.clone(),
            response: None,
        });

        if message.is_from_me {
            return;
        }
        let command = extract_command(&message.text, &settings.trigger_tag);
        if command.is_empty() {
            return;
        }
        if !settings.is_allowed(handle) {
            info!(from = %handle, "ignoring trigger from sender not in allow-list");
            return;
        }

        info!(from = %handle, command = %command, "trigger detected");
        let job = CommandJob {
            settings: Arc::clone(settings),
            command,
            handle: handle.to_string(),
            kind: message.kind,
            chat_guid: message.chat_guid.clone(),
            timestamp: message.timestamp,
            source: Arc::clone(&self.source),
            engine: Arc::clone(&self.engine),
            outbox: Arc::clone(&self.outbox),
            sink: Arc::clone(&self.sink),
        };
        self.tasks.spawn(job.run());
    }

    fn report_source_error(&self, e: &TapbackError) {
        if !e.is_source_unreachable() {
            warn!(error = %e, "poll failed");
            return;
        }
        if self.source_down.swap(true, Ordering::AcqRel) {
            debug!(error = %e, "message store still unreachable");
            return;
        }
        error!(error = %e, "message store unreachable");
        self.sink.emit(AgentEvent::AgentError {
            kind: "db_open".into(),
            error: e.to_string(),
            hint: Some(FULL_DISK_ACCESS_HINT.into()),
        });
    }
}

/// Everything one triggered command needs, detached from the poll loop.
struct CommandJob {
    settings: Arc<AiSettings>,
    command: String,
    handle: String,
    kind: ConversationKind,
    chat_guid: Option<String>,
    timestamp: i64,
    source: Arc<dyn ChatSource>,
    engine: Arc<ResponseEngine>,
    outbox: Arc<Outbox>,
    sink: Arc<dyn EventSink>,
}

impl CommandJob {
    async fn run(self) {
        let reply = self.route().await;
        if reply.trim().is_empty() {
            debug!(from = %self.handle, "empty reply, nothing to send");
            return;
        }

        let target = match (self.kind, &self.chat_guid) {
            (ConversationKind::Group, Some(guid)) => OutboundTarget::Chat(guid.clone()),
            _ => OutboundTarget::Phone(self.handle.clone()),
        };
        if let Err(e) = self.outbox.deliver(&reply, &target, Some(&self.handle)).await {
            warn!(from = %self.handle, error = %e, "reply not delivered");
            return;
        }
        self.sink.emit(AgentEvent::NewMessage {
            phone: self.handle.clone(),
            message: format!("{} {}", self.settings.trigger_tag, self.command),
            chat_type: self.kind,
            chat_guid: self.chat_guid.clone(),
            response: Some(reply),
        });
    }

    /// Try each applicable intent in priority order. Attachment routes are
    /// skipped when the conversation has nothing to work on.
    async fn route(&self) -> String {
        let settings = self.settings.as_ref();
        let tag = settings.trigger_tag.as_str();
        let mut extra_context = None;

        for intent in route_candidates(&self.command, tag) {
            match intent {
                Intent::Image => {
                    let paths = self.attachments(AttachmentKind::Image).await;
                    if !paths.is_empty() {
                        info!(count = paths.len(), "describing images");
                        return self.engine.describe_images(settings, &paths, &self.command).await;
                    }
                }
                Intent::Document => {
                    let paths = self.attachments(AttachmentKind::Pdf).await;
                    if !paths.is_empty() {
                        info!(count = paths.len(), "summarizing documents");
                        return self.engine.summarize_pdfs(settings, &paths, &self.command).await;
                    }
                }
                Intent::Mention => {
                    let Some(guid) = self.chat_guid.as_deref() else {
                        continue;
                    };
                    let mentions = parse_mentions(&self.command, tag);
                    let resolution = resolve_mentions(self.source.as_ref(), guid, &mentions).await;
                    if !resolution.ambiguous.is_empty() {
                        return disambiguation_prompt(&resolution.ambiguous);
                    }
                    extra_context = mention_context(&resolution.resolved);
                }
                Intent::PlainChat => {
                    let ctx = StreamContext {
                        phone: self.handle.clone(),
                        chat_guid: self.chat_guid.clone(),
                        requester: Some(self.handle.clone()),
                    };
                    return self
                        .engine
                        .query_stream(settings, &self.command, &ctx, extra_context.as_deref())
                        .await;
                }
            }
        }
        String::new()
    }

    /// Recent attachments of `kind` sent at or before the triggering message.
    async fn attachments(&self, kind: AttachmentKind) -> Vec<PathBuf> {
        let Some(guid) = self.chat_guid.as_deref() else {
            return Vec::new();
        };
        let max = infer_requested_count(&self.command, 1);
        self.source
            .fetch_recent_attachments(guid, kind, Some(self.timestamp), max)
            .await
            .unwrap_or_else(|e| {
                warn!(chat = %guid, kind = %kind, error = %e, "attachment lookup failed");
                Vec::new()
            })
    }
}
