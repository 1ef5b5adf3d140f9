// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized outbound delivery.
//!
//! AppleScript delivery is not safe to run concurrently, so every send in
//! the process goes through one [`Outbox`]. A successful send is recorded in
//! the audit log and announced as `message_sent`. Each send is bounded by a
//! timeout so a stuck `osascript` cannot hold the lock forever.

use std::sync::Arc;
use std::time::Duration;

use tapback_core::{
    AgentEvent, ConversationKind, Direction, EventSink, MessageSender, OutboundTarget,
    TapbackError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audit::AuditLog;

/// Default upper bound on a single delivery.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Outbox {
    sender: Arc<dyn MessageSender>,
    audit: Arc<AuditLog>,
    sink: Arc<dyn EventSink>,
    lock: Mutex<()>,
    timeout: Duration,
}

impl Outbox {
    pub fn new(sender: Arc<dyn MessageSender>, audit: Arc<AuditLog>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sender,
            audit,
            sink,
            lock: Mutex::new(()),
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `text` to `target`. `phone` labels the audit entry and event;
    /// it falls back to the chat identifier for group sends.
    pub async fn deliver(
        &self,
        text: &str,
        target: &OutboundTarget,
        phone: Option<&str>,
    ) -> Result<(), TapbackError> {
        if text.is_empty() {
            return Ok(());
        }
        {
            let _guard = self.lock.lock().await;
            let sent = match tokio::time::timeout(self.timeout, self.sender.send(text, target)).await {
                Ok(result) => result,
                Err(_) => Err(TapbackError::Timeout {
                    duration: self.timeout,
                }),
            };
            if let Err(e) = sent {
                warn!(target = ?target, error = %e, "send failed");
                return Err(e);
            }
        }

        let (label, chat_type, chat_guid) = match target {
            OutboundTarget::Chat(guid) => (
                phone.filter(|p| !p.is_empty()).unwrap_or(guid).to_string(),
                ConversationKind::Group,
                Some(guid.clone()),
            ),
            OutboundTarget::Phone(handle) => (handle.clone(), ConversationKind::Individual, None),
        };
        info!(to = %label, chat_type = %chat_type, "message sent");
        self.audit.append(&label, text, Direction::Sent);
        self.sink.emit(AgentEvent::MessageSent {
            phone: label,
            message: text.to_string(),
            chat_type,
            chat_guid,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tapback_test_utils::{MockSender, RecordingSink};

    struct StuckSender;

    #[async_trait]
    impl MessageSender for StuckSender {
        async fn send(&self, _text: &str, _target: &OutboundTarget) -> Result<(), TapbackError> {
            std::future::pending().await
        }
    }

    fn outbox(sender: Arc<MockSender>, sink: Arc<RecordingSink>) -> (Outbox, Arc<AuditLog>) {
        let audit = Arc::new(AuditLog::new(10, sink.clone()));
        (Outbox::new(sender, audit.clone(), sink), audit)
    }

    #[tokio::test]
    async fn group_send_is_labelled_with_phone() {
        let sender = Arc::new(MockSender::new());
        let sink = Arc::new(RecordingSink::new());
        let (outbox, audit) = outbox(sender.clone(), sink.clone());

        let target = OutboundTarget::Chat("iMessage;+;chat9".into());
        outbox.deliver("hello", &target, Some("+15550001111")).await.unwrap();

        assert_eq!(sender.sent_count().await, 1);
        assert_eq!(audit.get_message_log(None)[0].phone, "+15550001111");
        let sent = sink
            .events()
            .into_iter()
            .find(|e| e.name() == "message_sent")
            .unwrap();
        assert_eq!(
            sent,
            AgentEvent::MessageSent {
                phone: "+15550001111".into(),
                message: "hello".into(),
                chat_type: ConversationKind::Group,
                chat_guid: Some("iMessage;+;chat9".into()),
            }
        );
    }

    #[tokio::test]
    async fn failed_send_is_not_audited() {
        let sender = Arc::new(MockSender::new());
        sender.fail_sends(true);
        let sink = Arc::new(RecordingSink::new());
        let (outbox, audit) = outbox(sender, sink.clone());

        let target = OutboundTarget::Phone("+15550001111".into());
        assert!(outbox.deliver("hello", &target, None).await.is_err());
        assert!(audit.is_empty());
        assert_eq!(sink.count("message_sent"), 0);
    }

    #[tokio::test]
    async fn empty_text_is_skipped() {
        let sender = Arc::new(MockSender::new());
        let (outbox, _) = outbox(sender.clone(), Arc::new(RecordingSink::new()));
        outbox
            .deliver("", &OutboundTarget::Phone("+1".into()), None)
            .await
            .unwrap();
        assert_eq!(sender.sent_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_send_times_out_and_releases_the_lock() {
        let sink = Arc::new(RecordingSink::new());
        let audit = Arc::new(AuditLog::new(10, sink.clone()));
        let outbox = Outbox::new(Arc::new(StuckSender), audit.clone(), sink.clone())
            .with_timeout(Duration::from_secs(5));
        let target = OutboundTarget::Phone("+15550001111".into());

        let first = outbox.deliver("hello", &target, None).await;
        assert!(matches!(first, Err(TapbackError::Timeout { .. })));
        let second = outbox.deliver("again", &target, None).await;
        assert!(matches!(second, Err(TapbackError::Timeout { .. })));
        assert!(audit.is_empty());
        assert_eq!(sink.count("message_sent"), 0);
    }
}
