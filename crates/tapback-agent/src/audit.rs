// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded in-memory log of every message seen or sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Local;
use tapback_core::{AgentEvent, AuditEntry, ContactResolver, Direction, EventSink};

/// Default number of entries returned by [`AuditLog::get_message_log`].
pub const DEFAULT_LOG_LIMIT: usize = 250;
/// Upper bound for a single log read.
pub const MAX_LOG_LIMIT: usize = 500;

/// Ring of audit entries. The oldest entry is dropped once `capacity` is hit.
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    contacts: Option<Arc<dyn ContactResolver>>,
    sink: Arc<dyn EventSink>,
}

impl AuditLog {
    pub fn new(capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            contacts: None,
            sink,
        }
    }

    pub fn with_contacts(mut self, contacts: Arc<dyn ContactResolver>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Record a message and broadcast the updated log.
    pub fn append(&self, phone: &str, message: &str, direction: Direction) {
        let contact = self
            .contacts
            .as_ref()
            .and_then(|c| c.display_name(phone))
            .unwrap_or_else(|| "Unknown".to_string());
        let entry = AuditEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            phone: phone.to_string(),
            contact,
            message: message.to_string(),
            direction,
        };

        let snapshot = {
            let Ok(mut entries) = self.entries.lock() else {
                return;
            };
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
            entries.iter().cloned().collect::<Vec<_>>()
        };
        self.sink.emit(AgentEvent::UpdateAnalytics { log: snapshot });
    }

    /// The most recent `limit` entries, oldest first. `limit` is clamped to
    /// `[1, 500]` and defaults to 250.
    pub fn get_message_log(&self, limit: Option<usize>) -> Vec<AuditEntry> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapback_test_utils::{RecordingSink, StaticContacts};

    #[test]
    fn append_emits_analytics_with_contact_names() {
        let sink = Arc::new(RecordingSink::new());
        let log = AuditLog::new(10, sink.clone())
            .with_contacts(Arc::new(StaticContacts::new([("+15550001111", "Ann")])));

        log.append("+15550001111", "hi", Direction::Received);
        log.append("+15550009999", "yo", Direction::Sent);

        assert_eq!(sink.count("update_analytics"), 2);
        let entries = log.get_message_log(None);
        assert_eq!(entries[0].contact, "Ann");
        assert_eq!(entries[1].contact, "Unknown");
        assert_eq!(entries[1].direction, Direction::Sent);
        match sink.events().last() {
            Some(AgentEvent::UpdateAnalytics { log }) => assert_eq!(log.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn capacity_drops_oldest() {
        let log = AuditLog::new(3, Arc::new(RecordingSink::new()));
        for i in 0..5 {
            log.append("+1", &format!("m{i}"), Direction::Received);
        }
        let messages: Vec<_> = log.get_message_log(None).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn limit_is_clamped() {
        let log = AuditLog::new(1000, Arc::new(RecordingSink::new()));
        for i in 0..600 {
            log.append("+1", &i.to_string(), Direction::Received);
        }
        assert_eq!(log.get_message_log(None).len(), 250);
        assert_eq!(log.get_message_log(Some(0)).len(), 1);
        assert_eq!(log.get_message_log(Some(10_000)).len(), 500);
        assert_eq!(log.get_message_log(Some(2))[1].message, "599");
    }
}
