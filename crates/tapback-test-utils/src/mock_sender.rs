// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outbound sender that captures deliveries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tapback_core::{MessageSender, OutboundTarget, TapbackError};

/// Captures every `send()` call for assertion.
pub struct MockSender {
    sent: Arc<Mutex<Vec<(String, OutboundTarget)>>>,
    fail: AtomicBool,
}

impl MockSender {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent sends fail (still recorded).
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<(String, OutboundTarget)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send(&self, text: &str, target: &OutboundTarget) -> Result<(), TapbackError> {
        self.sent.lock().await.push((text.to_string(), target.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(TapbackError::Send {
                message: "mock send failure".into(),
                source: None,
            });
        }
        Ok(())
    }
}
