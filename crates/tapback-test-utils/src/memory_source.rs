// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat store for dispatch and engine tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tapback_core::{
    AttachmentKind, ChatSource, ConversationKind, Message, Participant, TapbackError,
    normalize_handle,
};

#[derive(Default)]
struct State {
    messages: Vec<Message>,
    participants: HashMap<String, Vec<Participant>>,
    attachments: HashMap<(String, AttachmentKind), Vec<(i64, PathBuf)>>,
    next_id: i64,
}

/// A [`ChatSource`] whose contents tests push directly.
#[derive(Default)]
pub struct MemoryChatSource {
    state: Mutex<State>,
    unreachable: AtomicBool,
}

impl MemoryChatSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store that cannot be opened.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Push an inbound message from `sender` into `chat_guid`.
    pub fn push(&self, chat_guid: &str, kind: ConversationKind, sender: &str, text: &str, timestamp: i64) -> Message {
        self.push_message(chat_guid, kind, sender, text, timestamp, false)
    }

    /// Push a message authored by the local user.
    pub fn push_from_me(&self, chat_guid: &str, kind: ConversationKind, text: &str, timestamp: i64) -> Message {
        self.push_message(chat_guid, kind, "", text, timestamp, true)
    }

    pub fn set_participants(&self, chat_guid: &str, participants: Vec<Participant>) {
        if let Ok(mut state) = self.state.lock() {
            state.participants.insert(chat_guid.to_string(), participants);
        }
    }

    /// Register an attachment of `kind` sent at `timestamp`.
    pub fn add_attachment(&self, chat_guid: &str, kind: AttachmentKind, timestamp: i64, path: PathBuf) {
        if let Ok(mut state) = self.state.lock() {
            state
                .attachments
                .entry((chat_guid.to_string(), kind))
                .or_default()
                .push((timestamp, path));
        }
    }

    fn push_message(
        &self,
        chat_guid: &str,
        kind: ConversationKind,
        sender: &str,
        text: &str,
        timestamp: i64,
        is_from_me: bool,
    ) -> Message {
        let mut state = self.state.lock().expect("memory source poisoned");
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            chat_guid: (!chat_guid.is_empty()).then(|| chat_guid.to_string()),
            kind,
            is_from_me,
            sender: sender.to_string(),
            handle: normalize_handle(sender),
            text: text.to_string(),
            timestamp,
            service: Some("iMessage".into()),
        };
        state.messages.push(message.clone());
        message
    }

    fn check(&self) -> Result<(), TapbackError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TapbackError::SourceUnreachable {
                path: "memory".into(),
                source: Box::new(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, TapbackError> {
        self.state
            .lock()
            .map_err(|_| TapbackError::Internal("memory source poisoned".into()))
    }
}

#[async_trait]
impl ChatSource for MemoryChatSource {
    async fn latest_timestamp(&self) -> Result<i64, TapbackError> {
        self.check()?;
        Ok(self.lock()?.messages.iter().map(|m| m.timestamp).max().unwrap_or(0))
    }

    async fn fetch_new_messages(&self, since: i64) -> Result<Vec<Message>, TapbackError> {
        self.check()?;
        let mut out: Vec<_> = self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.timestamp > since)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.timestamp);
        Ok(out)
    }

    async fn fetch_recent_messages(&self, chat_guid: &str, limit: usize) -> Result<Vec<Message>, TapbackError> {
        self.check()?;
        let mut out: Vec<_> = self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.chat_guid.as_deref() == Some(chat_guid))
            .cloned()
            .collect();
        out.sort_by_key(|m| m.timestamp);
        let skip = out.len().saturating_sub(limit);
        Ok(out.split_off(skip))
    }

    async fn fetch_participants(&self, chat_guid: &str) -> Result<Vec<Participant>, TapbackError> {
        self.check()?;
        Ok(self.lock()?.participants.get(chat_guid).cloned().unwrap_or_default())
    }

    async fn fetch_recent_attachments(
        &self,
        chat_guid: &str,
        kind: AttachmentKind,
        before: Option<i64>,
        max: usize,
    ) -> Result<Vec<PathBuf>, TapbackError> {
        self.check()?;
        let state = self.lock()?;
        let mut found: Vec<_> = state
            .attachments
            .get(&(chat_guid.to_string(), kind))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(ts, _)| before.is_none_or(|b| *ts <= b))
            .collect();
        found.sort_by_key(|(ts, _)| std::cmp::Reverse(*ts));
        Ok(found.into_iter().map(|(_, p)| p).take(max).collect())
    }

    async fn check_reachability(&self) -> Result<(), TapbackError> {
        self.check()
    }
}
