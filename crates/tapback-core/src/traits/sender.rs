// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message delivery.

use async_trait::async_trait;

use crate::error::TapbackError;
use crate::types::OutboundTarget;

/// Delivers text to a buddy or a conversation.
#[async_trait]
pub trait MessageSender: Send + Sync + 'static {
    async fn send(&self, text: &str, target: &OutboundTarget) -> Result<(), TapbackError>;
}
