// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages.app integration for the Tapback agent.
//!
//! Reads the local `chat.db` (read-only), delivers replies through
//! AppleScript, resolves participant names through Contacts.app, and
//! converts images with `sips`.

pub mod applescript;
pub mod attachments;
pub mod contacts;
pub mod convert;
pub mod decode;
pub mod reader;
pub mod sender;

pub use contacts::ContactsApp;
pub use convert::SipsConverter;
pub use reader::ChatDbReader;
pub use sender::AppleScriptSender;
