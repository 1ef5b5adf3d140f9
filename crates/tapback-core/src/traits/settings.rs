// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Settings snapshot access.

use std::sync::Arc;

use crate::settings::AiSettings;

/// Source of the current settings. Read once per poll cycle or command.
pub trait SettingsProvider: Send + Sync + 'static {
    fn snapshot(&self) -> Arc<AiSettings>;
}
