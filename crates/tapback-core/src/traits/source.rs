// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to the underlying chat store.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::TapbackError;
use crate::types::{AttachmentKind, Message, Participant};

/// Read-only view of a chat store.
///
/// Implementations must return [`TapbackError::SourceUnreachable`] when the
/// store cannot be opened so callers can surface an actionable diagnostic.
#[async_trait]
pub trait ChatSource: Send + Sync + 'static {
    /// Highest message timestamp currently stored, 0 for an empty store.
    async fn latest_timestamp(&self) -> Result<i64, TapbackError>;

    /// Messages strictly newer than `since`, ascending by timestamp.
    async fn fetch_new_messages(&self, since: i64) -> Result<Vec<Message>, TapbackError>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn fetch_recent_messages(
        &self,
        chat_guid: &str,
        limit: usize,
    ) -> Result<Vec<Message>, TapbackError>;

    /// Conversation members, deduplicated by normalized handle.
    async fn fetch_participants(&self, chat_guid: &str) -> Result<Vec<Participant>, TapbackError>;

    /// Paths of recent attachments of `kind`, newest first, that exist on disk.
    async fn fetch_recent_attachments(
        &self,
        chat_guid: &str,
        kind: AttachmentKind,
        before: Option<i64>,
        max: usize,
    ) -> Result<Vec<PathBuf>, TapbackError>;

    /// Open the store and run a trivial query.
    async fn check_reachability(&self) -> Result<(), TapbackError>;
}
