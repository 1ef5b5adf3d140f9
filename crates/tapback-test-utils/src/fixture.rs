// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk fixtures shaped like the Messages database.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tempfile::TempDir;

/// Prefix of an archived `NSAttributedString`, ending at the string tag.
const TYPEDSTREAM_HEADER: &[u8] = b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x12NSAttributedString\x00\x84\x84\x08NSObject\x00\x85\x92\x84\x84\x84\x08NSString\x01\x94\x84\x01+";

/// Attribute dictionary that follows the string payload.
const TYPEDSTREAM_TAIL: &[u8] = b"\x86\x84\x02iI\x01\x0b\x92\x84\x84\x84\x0cNSDictionary\x00\x94\x84\x01i\x01\x92\x84\x96\x96\x1d__kIMMessagePartAttributeName\x86\x92\x84\x84\x84\x08NSNumber\x00\x84\x84\x07NSValue\x00\x94\x84\x01*\x84\x99\x99\x00\x86\x86\x86";

/// Encode `text` the way Messages archives a message body.
pub fn typedstream_body(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut blob = TYPEDSTREAM_HEADER.to_vec();
    match bytes.len() {
        n if n < 0x80 => blob.push(n as u8),
        n if n <= u16::MAX as usize => {
            blob.push(0x81);
            blob.extend_from_slice(&(n as u16).to_le_bytes());
        }
        n => {
            blob.push(0x82);
            blob.extend_from_slice(&(n as u32).to_le_bytes());
        }
    }
    blob.extend_from_slice(bytes);
    blob.extend_from_slice(TYPEDSTREAM_TAIL);
    blob
}

const SCHEMA: &str = "
    CREATE TABLE handle (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL, service TEXT);
    CREATE TABLE chat (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, guid TEXT UNIQUE NOT NULL, chat_identifier TEXT);
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT,
        attributedBody BLOB,
        handle_id INTEGER DEFAULT 0,
        date INTEGER,
        is_from_me INTEGER DEFAULT 0,
        service TEXT
    );
    CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER, PRIMARY KEY (chat_id, message_id));
    CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER, UNIQUE (chat_id, handle_id));
    CREATE TABLE attachment (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, filename TEXT, mime_type TEXT, uti TEXT);
    CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER, UNIQUE (message_id, attachment_id));
";

/// A throwaway `chat.db` with the subset of the Messages schema the reader queries.
///
/// The directory (and the database) is removed when the fixture drops.
pub struct FixtureChatDb {
    dir: TempDir,
    conn: Connection,
}

impl FixtureChatDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fixture dir");
        let conn = Connection::open(dir.path().join("chat.db")).expect("open fixture db");
        conn.execute_batch(SCHEMA).expect("create fixture schema");
        Self { dir, conn }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("chat.db")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Create a chat with the given member handles and return its row id.
    pub fn add_chat(&self, guid: &str, handles: &[&str]) -> i64 {
        self.conn
            .execute(
                "INSERT INTO chat (guid, chat_identifier) VALUES (?1, ?1)",
                params![guid],
            )
            .expect("insert chat");
        let chat_id = self.conn.last_insert_rowid();
        for handle in handles {
            let handle_id = self.handle_id(handle);
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                    params![chat_id, handle_id],
                )
                .expect("join handle");
        }
        chat_id
    }

    /// Insert a message with a plain `text` column.
    pub fn add_message(&self, chat_id: i64, sender: &str, text: &str, date: i64, is_from_me: bool) -> i64 {
        self.insert_message(chat_id, sender, Some(text), None, date, is_from_me)
    }

    /// Insert a message whose body only exists as an archived `attributedBody`.
    pub fn add_archived_message(
        &self,
        chat_id: i64,
        sender: &str,
        text: &str,
        date: i64,
        is_from_me: bool,
    ) -> i64 {
        let blob = typedstream_body(text);
        self.insert_message(chat_id, sender, None, Some(blob), date, is_from_me)
    }

    /// Attach a file to a message.
    pub fn add_attachment(&self, message_id: i64, filename: &str, mime: Option<&str>, uti: Option<&str>) {
        self.conn
            .execute(
                "INSERT INTO attachment (filename, mime_type, uti) VALUES (?1, ?2, ?3)",
                params![filename, mime, uti],
            )
            .expect("insert attachment");
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message_id, attachment_id],
            )
            .expect("join attachment");
    }

    /// Create an empty file inside the fixture directory.
    pub fn touch_file(&self, name: &str) -> PathBuf {
        self.write_file(name, b"")
    }

    /// Create a file with contents inside the fixture directory.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }

    fn insert_message(
        &self,
        chat_id: i64,
        sender: &str,
        text: Option<&str>,
        body: Option<Vec<u8>>,
        date: i64,
        is_from_me: bool,
    ) -> i64 {
        let handle_id = if sender.is_empty() { 0 } else { self.handle_id(sender) };
        self.conn
            .execute(
                "INSERT INTO message (text, attributedBody, handle_id, date, is_from_me, service)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'iMessage')",
                params![text, body, handle_id, date, is_from_me as i64],
            )
            .expect("insert message");
        let message_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat_id, message_id],
            )
            .expect("join message");
        message_id
    }

    fn handle_id(&self, raw: &str) -> i64 {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT ROWID FROM handle WHERE id = ?1", params![raw], |r| r.get(0))
            .optional()
            .expect("lookup handle");
        if let Some(id) = existing {
            return id;
        }
        self.conn
            .execute(
                "INSERT INTO handle (id, service) VALUES (?1, 'iMessage')",
                params![raw],
            )
            .expect("insert handle");
        self.conn.last_insert_rowid()
    }
}

impl Default for FixtureChatDb {
    fn default() -> Self {
        Self::new()
    }
}
