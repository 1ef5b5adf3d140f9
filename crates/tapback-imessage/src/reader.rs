// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to the Messages SQLite database.
//!
//! Messages.app is the only writer. Every call opens a fresh read-only
//! connection on the blocking pool and closes it before returning, so no
//! lock is held between polls.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OpenFlags, params};
use tapback_core::{
    AttachmentKind, ChatSource, ContactResolver, ConversationKind, Message, Participant,
    TapbackError, normalize_handle,
};
use tracing::debug;

use crate::attachments;
use crate::decode::message_text;

/// Rows scanned when looking for attachments.
const ATTACHMENT_SCAN_LIMIT: i64 = 50;

const NEW_MESSAGES_SQL: &str = "
    SELECT
        m.rowid,
        c.guid,
        COALESCE(p.participant_count, 0),
        m.is_from_me,
        h.id,
        m.date,
        m.attributedBody,
        m.text,
        m.service
    FROM message AS m
    LEFT JOIN handle AS h ON h.rowid = m.handle_id
    LEFT JOIN chat_message_join AS cmj ON cmj.message_id = m.rowid
    LEFT JOIN chat AS c ON c.rowid = cmj.chat_id
    LEFT JOIN (
        SELECT count(*) AS participant_count, cmj.chat_id, cmj.message_id AS mid
        FROM chat_handle_join AS chj
        INNER JOIN chat_message_join AS cmj ON cmj.chat_id = chj.chat_id
        GROUP BY cmj.message_id, cmj.chat_id
    ) AS p ON p.mid = m.rowid
    WHERE m.date > ?1
    ORDER BY m.date ASC";

const RECENT_MESSAGES_SQL: &str = "
    SELECT m.rowid, m.is_from_me, h.id, m.date, m.attributedBody, m.text, m.service
    FROM message AS m
    INNER JOIN chat_message_join AS cmj ON cmj.message_id = m.rowid
    INNER JOIN chat AS c ON c.rowid = cmj.chat_id
    LEFT JOIN handle AS h ON h.rowid = m.handle_id
    WHERE c.guid = ?1
    ORDER BY m.date DESC
    LIMIT ?2";

const PARTICIPANTS_SQL: &str = "
    SELECT h.id
    FROM handle AS h
    INNER JOIN chat_handle_join AS chj ON chj.handle_id = h.rowid
    INNER JOIN chat AS c ON c.rowid = chj.chat_id
    WHERE c.guid = ?1";

const ATTACHMENTS_SQL: &str = "
    SELECT a.filename, a.mime_type, a.uti
    FROM message AS m
    INNER JOIN chat_message_join AS cmj ON cmj.message_id = m.rowid
    INNER JOIN chat AS c ON c.rowid = cmj.chat_id
    INNER JOIN message_attachment_join AS maj ON maj.message_id = m.rowid
    INNER JOIN attachment AS a ON a.rowid = maj.attachment_id
    WHERE c.guid = ?1 AND m.date <= ?2
    ORDER BY m.date DESC
    LIMIT ?3";

/// [`ChatSource`] backed by `~/Library/Messages/chat.db`.
pub struct ChatDbReader {
    path: PathBuf,
    contacts: Option<Arc<dyn ContactResolver>>,
}

impl ChatDbReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contacts: None,
        }
    }

    /// Enrich participants with display names from `contacts`.
    pub fn with_contacts(mut self, contacts: Arc<dyn ContactResolver>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a fresh read-only connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, TapbackError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = open_read_only(&path)?;
            let out = f(&conn).map_err(|e| classify(&path, e));
            if let Err((_, e)) = conn.close() {
                debug!(error = %e, "chat.db close failed");
            }
            out
        })
        .await
        .map_err(|e| TapbackError::Internal(format!("chat.db task failed: {e}")))?
    }
}

fn open_read_only(path: &Path) -> Result<Connection, TapbackError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| TapbackError::SourceUnreachable {
        path: path.display().to_string(),
        source: Box::new(e),
    })
}

/// Permission failures often surface on the first query rather than at open.
fn classify(path: &Path, err: rusqlite::Error) -> TapbackError {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::PermissionDenied
            | ErrorCode::AuthorizationForStatementDenied
            | ErrorCode::NotADatabase,
        ) => TapbackError::SourceUnreachable {
            path: path.display().to_string(),
            source: Box::new(err),
        },
        _ => TapbackError::storage(err),
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

#[async_trait]
impl ChatSource for ChatDbReader {
    async fn latest_timestamp(&self) -> Result<i64, TapbackError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COALESCE(MAX(date), 0) FROM message", [], |row| row.get(0))
        })
        .await
    }

    async fn fetch_new_messages(&self, since: i64) -> Result<Vec<Message>, TapbackError> {
        let messages = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(NEW_MESSAGES_SQL)?;
                let rows = stmt.query_map(params![since], |row| {
                    let sender: Option<String> = row.get(4)?;
                    let body: Option<Vec<u8>> = row.get(6)?;
                    let plain: Option<String> = row.get(7)?;
                    let sender = sender.unwrap_or_default();
                    Ok(Message {
                        id: row.get(0)?,
                        chat_guid: row.get(1)?,
                        kind: ConversationKind::from_participant_count(row.get(2)?),
                        is_from_me: row.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
                        handle: normalize_handle(&sender),
                        sender,
                        timestamp: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        text: message_text(body.as_deref(), plain.as_deref()),
                        service: row.get(8)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await?;

        if !messages.is_empty() {
            debug!(count = messages.len(), since, "fetched new messages");
        }
        Ok(messages)
    }

    async fn fetch_recent_messages(
        &self,
        chat_guid: &str,
        limit: usize,
    ) -> Result<Vec<Message>, TapbackError> {
        let guid = chat_guid.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut messages = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(RECENT_MESSAGES_SQL)?;
                let rows = stmt.query_map(params![guid, limit], |row| {
                    let sender: Option<String> = row.get(2)?;
                    let body: Option<Vec<u8>> = row.get(4)?;
                    let plain: Option<String> = row.get(5)?;
                    let sender = sender.unwrap_or_default();
                    Ok(Message {
                        id: row.get(0)?,
                        chat_guid: Some(guid.clone()),
                        kind: ConversationKind::Unknown,
                        is_from_me: row.get::<_, Option<i64>>(1)?.unwrap_or(0) != 0,
                        handle: normalize_handle(&sender),
                        sender,
                        timestamp: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        text: message_text(body.as_deref(), plain.as_deref()),
                        service: row.get(6)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await?;

        messages.reverse();
        Ok(messages)
    }

    async fn fetch_participants(&self, chat_guid: &str) -> Result<Vec<Participant>, TapbackError> {
        let guid = chat_guid.to_string();
        let contacts = self.contacts.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(PARTICIPANTS_SQL)?;
            let handles = stmt
                .query_map(params![guid], |row| row.get::<_, Option<String>>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut seen = HashSet::new();
            let participants = handles
                .into_iter()
                .flatten()
                .map(|raw| normalize_handle(&raw))
                .filter(|handle| !handle.is_empty() && seen.insert(handle.clone()))
                .map(|handle| Participant {
                    name: contacts.as_ref().and_then(|c| c.display_name(&handle)),
                    handle,
                })
                .collect();
            Ok(participants)
        })
        .await
    }

    async fn fetch_recent_attachments(
        &self,
        chat_guid: &str,
        kind: AttachmentKind,
        before: Option<i64>,
        max: usize,
    ) -> Result<Vec<PathBuf>, TapbackError> {
        if chat_guid.is_empty() || max == 0 {
            return Ok(Vec::new());
        }
        let guid = chat_guid.to_string();
        let before = before.unwrap_or(i64::MAX);
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(ATTACHMENTS_SQL)?;
                let rows = stmt.query_map(params![guid, before, ATTACHMENT_SCAN_LIMIT], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await?;

        let paths: Vec<PathBuf> = rows
            .into_iter()
            .filter(|(filename, mime, uti)| {
                attachments::matches(kind, mime.as_deref(), uti.as_deref(), filename.as_deref())
            })
            .filter_map(|(filename, _, _)| filename)
            .map(|filename| expand_home(&filename))
            .filter(|path| path.exists())
            .take(max)
            .collect();

        debug!(chat = chat_guid, %kind, found = paths.len(), "attachment scan");
        Ok(paths)
    }

    async fn check_reachability(&self) -> Result<(), TapbackError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }
}
