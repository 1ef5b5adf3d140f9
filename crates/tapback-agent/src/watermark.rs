// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent high-water mark of processed message timestamps.
//!
//! Only the poll loop writes the watermark; the health check reads it
//! concurrently, so the value lives in an atomic. Timestamps are raw store
//! values and are only ever compared.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use tapback_core::TapbackError;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    last_seen_date: i64,
}

/// The last processed message timestamp, optionally backed by a JSON file.
#[derive(Debug)]
pub struct Watermark {
    value: AtomicI64,
    path: Option<PathBuf>,
}

impl Watermark {
    pub fn in_memory(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
            path: None,
        }
    }

    /// Load from `path`. A missing or unreadable file starts at zero.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StateFile>(&raw) {
                Ok(state) => state.last_seen_date,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read state file");
                0
            }
        };
        debug!(path = %path.display(), last_seen = initial, "watermark loaded");
        Self {
            value: AtomicI64::new(initial),
            path: Some(path),
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Raise the watermark to `timestamp`. Never moves backwards. Returns
    /// whether the value changed.
    pub fn advance(&self, timestamp: i64) -> bool {
        self.value.fetch_max(timestamp, Ordering::AcqRel) < timestamp
    }

    /// Persist the current value.
    pub fn save(&self) -> Result<(), TapbackError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_state(path, self.get())
    }

    /// On first run, skip history by starting at `latest`, unless `replay`
    /// is set. Has no effect once a watermark exists.
    pub fn initialize_if_empty(&self, latest: i64, replay: bool) -> Result<(), TapbackError> {
        if self.get() != 0 || replay || latest <= 0 {
            return Ok(());
        }
        if self
            .value
            .compare_exchange(0, latest, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(last_seen = latest, "watermark initialized from latest message");
            self.save()?;
        }
        Ok(())
    }
}

fn write_state(path: &Path, last_seen_date: i64) -> Result<(), TapbackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TapbackError::storage)?;
    }
    let json = serde_json::to_string(&StateFile { last_seen_date }).map_err(TapbackError::storage)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(TapbackError::storage)?;
    std::fs::rename(&tmp, path).map_err(TapbackError::storage)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let mark = Watermark::in_memory(10);
        assert!(mark.advance(12));
        assert!(!mark.advance(11));
        assert!(!mark.advance(12));
        assert_eq!(mark.get(), 12);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        let mark = Watermark::load(&path);
        assert_eq!(mark.get(), 0);
        mark.advance(700_000);
        mark.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"last_seen_date":700000}"#);
        assert_eq!(Watermark::load(&path).get(), 700_000);
    }

    #[test]
    fn first_run_skips_history_unless_replaying() {
        let fresh = Watermark::in_memory(0);
        fresh.initialize_if_empty(500, true).unwrap();
        assert_eq!(fresh.get(), 0);
        fresh.initialize_if_empty(500, false).unwrap();
        assert_eq!(fresh.get(), 500);

        let existing = Watermark::in_memory(42);
        existing.initialize_if_empty(500, false).unwrap();
        assert_eq!(existing.get(), 42);
    }

    #[test]
    fn corrupt_state_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(Watermark::load(&path).get(), 0);
    }
}
