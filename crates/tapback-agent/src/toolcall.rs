// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Accumulation of streamed function-tool calls.
//!
//! Each call moves through `Opened → Accumulating → Complete → Executed`.
//! Argument fragments may arrive before the call is announced; those create
//! the entry on first sight. Only complete calls are handed out for
//! execution, and a call is executed at most once.

use std::collections::HashMap;

use serde_json::Value;
use tapback_core::types::ToolOutput;
use tracing::warn;

/// Lifecycle state of a streamed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    Opened,
    Accumulating,
    Complete,
    Executed,
}

#[derive(Debug)]
struct Entry {
    name: Option<String>,
    arguments: String,
    state: ToolCallState,
}

/// A complete call ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    /// Parsed arguments. Text that is not a JSON object is treated as the
    /// `query` argument itself.
    pub fn parsed_arguments(&self) -> Value {
        if self.arguments.trim().is_empty() {
            return Value::Object(Default::default());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(v @ Value::Object(_)) => v,
            _ => serde_json::json!({ "query": self.arguments }),
        }
    }

    /// Pair this call with its result.
    pub fn finish(self, output: String) -> ToolOutput {
        ToolOutput {
            call_id: self.call_id,
            output,
        }
    }
}

/// Tracks every tool call seen during one model turn.
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: HashMap<String, Entry>,
    order: Vec<String>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, call_id: &str) -> &mut Entry {
        if !self.calls.contains_key(call_id) {
            self.order.push(call_id.to_string());
        }
        self.calls.entry(call_id.to_string()).or_insert_with(|| Entry {
            name: None,
            arguments: String::new(),
            state: ToolCallState::Opened,
        })
    }

    pub fn open(&mut self, call_id: &str, name: &str) {
        let entry = self.entry(call_id);
        if !name.is_empty() {
            entry.name = Some(name.to_string());
        }
    }

    pub fn append(&mut self, call_id: &str, delta: &str) {
        let entry = self.entry(call_id);
        if matches!(entry.state, ToolCallState::Opened | ToolCallState::Accumulating) {
            entry.arguments.push_str(delta);
            entry.state = ToolCallState::Accumulating;
        }
    }

    /// Mark a call complete. Non-empty `arguments` replace whatever was
    /// accumulated from deltas.
    pub fn complete(&mut self, call_id: &str, arguments: &str) {
        let entry = self.entry(call_id);
        if entry.state == ToolCallState::Executed {
            return;
        }
        if !arguments.is_empty() {
            entry.arguments = arguments.to_string();
        }
        entry.state = ToolCallState::Complete;
    }

    pub fn state(&self, call_id: &str) -> Option<ToolCallState> {
        self.calls.get(call_id).map(|e| e.state)
    }

    /// Hand out every complete call in arrival order and mark it executed.
    pub fn take_complete(&mut self) -> Vec<ToolCall> {
        let mut ready = Vec::new();
        for id in &self.order {
            let Some(entry) = self.calls.get_mut(id) else {
                continue;
            };
            if entry.state != ToolCallState::Complete {
                continue;
            }
            entry.state = ToolCallState::Executed;
            ready.push(ToolCall {
                call_id: id.clone(),
                name: entry.name.clone().unwrap_or_default(),
                arguments: entry.arguments.clone(),
            });
        }
        ready
    }

    /// Number of calls that never completed. Logged, then dropped.
    pub fn pending(&self) -> usize {
        let pending = self
            .calls
            .values()
            .filter(|e| matches!(e.state, ToolCallState::Opened | ToolCallState::Accumulating))
            .count();
        if pending > 0 {
            warn!(pending, "dropping incomplete tool calls");
        }
        pending
    }
}
