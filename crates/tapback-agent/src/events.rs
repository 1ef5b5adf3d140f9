// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of agent events to live observers.

use tapback_core::{AgentEvent, EventSink};
use tokio::sync::broadcast;
use tracing::trace;

/// Default buffer per subscriber before slow observers start lagging.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// An [`EventSink`] backed by a tokio broadcast channel.
///
/// Emitting never blocks. With no subscribers, events are dropped; a
/// subscriber that falls behind skips the oldest events.
pub struct BroadcastSink {
    tx: broadcast::Sender<AgentEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: AgentEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            trace!(event = name, "no event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapback_core::StreamPayload;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let sink = BroadcastSink::default();
        let mut rx = sink.subscribe();
        sink.emit(AgentEvent::AiStream {
            phone: "+1".into(),
            chat_guid: None,
            payload: StreamPayload::Delta { delta: "hi".into() },
        });
        assert_eq!(rx.recv().await.unwrap().name(), "ai_stream");
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        BroadcastSink::new(1).emit(AgentEvent::UpdateAnalytics { log: Vec::new() });
    }
}
