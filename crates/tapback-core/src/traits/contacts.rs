// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display-name lookup for conversation members.

/// Best-effort handle-to-name lookup. Blocking; call from a blocking context.
pub trait ContactResolver: Send + Sync + 'static {
    fn display_name(&self, handle: &str) -> Option<String>;
}
