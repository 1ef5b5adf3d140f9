// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live event publication.

use crate::types::AgentEvent;

/// Fire-and-forget event publisher. Emission never fails from the caller's view.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: AgentEvent);
}
