// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily scheduled messages.
//!
//! Each entry fires once per local day, on the first scheduler tick at or
//! after its `HH:MM` time. The book is persisted as JSON so entries and
//! their last run dates survive restarts.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tapback_core::{OutboundTarget, TapbackError, normalize_phone};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::outbox::Outbox;

const TIME_FORMAT: &str = "%H:%M";

/// A message sent to `phone` every day at `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub time: String,
    pub phone: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<NaiveDate>,
}

impl ScheduledMessage {
    fn at(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()
    }

    fn is_due(&self, now: NaiveDateTime) -> bool {
        let today = now.date();
        self.last_run != Some(today) && self.at().is_some_and(|at| now.time() >= at)
    }
}

/// The set of scheduled messages.
pub struct ScheduleBook {
    entries: Mutex<Vec<ScheduledMessage>>,
    path: Option<PathBuf>,
}

impl ScheduleBook {
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Open a book persisted at `path`. Missing or corrupt files start empty.
    ///
    /// The file is shared with the admin CLI, so every read and every change
    /// goes back to disk first.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        Self {
            entries: Mutex::new(entries),
            path: Some(path),
        }
    }

    /// Add an entry. `time` must be `HH:MM`. A time already past today
    /// first fires tomorrow.
    pub fn schedule(
        &self,
        time: &str,
        phone: &str,
        message: &str,
        now: NaiveDateTime,
    ) -> Result<ScheduledMessage, TapbackError> {
        let time = time.trim();
        let at = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|_| TapbackError::InvalidInput(format!("invalid time `{time}`, expected HH:MM")))?;
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Err(TapbackError::InvalidInput("phone number is required".into()));
        }
        if message.trim().is_empty() {
            return Err(TapbackError::InvalidInput("message is required".into()));
        }

        let entry = ScheduledMessage {
            id: uuid::Uuid::new_v4().to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            phone,
            message: message.to_string(),
            last_run: (now.time() > at).then(|| now.date()),
        };
        self.mutate(|entries| entries.push(entry.clone()))?;
        info!(id = %entry.id, time = %entry.time, "message scheduled");
        Ok(entry)
    }

    /// Remove an entry by id. Returns whether one was removed.
    pub fn remove(&self, id: &str) -> Result<bool, TapbackError> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        })
    }

    pub fn list(&self) -> Vec<ScheduledMessage> {
        let Ok(mut entries) = self.entries.lock() else {
            return Vec::new();
        };
        if let Some(path) = &self.path {
            *entries = read_entries(path);
        }
        entries.clone()
    }

    /// Entries due at `now`, marked as run for today.
    pub fn take_due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledMessage>, TapbackError> {
        if !self.list().iter().any(|e| e.is_due(now)) {
            return Ok(Vec::new());
        }
        self.mutate(|entries| {
            let mut due = Vec::new();
            for entry in entries.iter_mut().filter(|e| e.is_due(now)) {
                entry.last_run = Some(now.date());
                due.push(entry.clone());
            }
            due
        })
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<ScheduledMessage>) -> T) -> Result<T, TapbackError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TapbackError::Internal("schedule lock poisoned".into()))?;
        if let Some(path) = &self.path {
            *entries = read_entries(path);
        }
        let out = f(&mut entries);
        if let Some(path) = &self.path {
            write_entries(path, &entries)?;
        }
        Ok(out)
    }
}

fn read_entries(path: &Path) -> Vec<ScheduledMessage> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring corrupt schedule file");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

fn write_entries(path: &Path, entries: &[ScheduledMessage]) -> Result<(), TapbackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TapbackError::storage)?;
    }
    let json = serde_json::to_string_pretty(entries).map_err(TapbackError::storage)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(TapbackError::storage)?;
    std::fs::rename(&tmp, path).map_err(TapbackError::storage)?;
    Ok(())
}

/// Send due entries every `interval` until `cancel` fires.
pub async fn run_scheduler(
    book: Arc<ScheduleBook>,
    outbox: Arc<Outbox>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "scheduler running");
    loop {
        match book.take_due(Local::now().naive_local()) {
            Ok(due) => {
                for entry in due {
                    debug!(id = %entry.id, "sending scheduled message");
                    let target = OutboundTarget::Phone(entry.phone.clone());
                    if let Err(e) = outbox.deliver(&entry.message, &target, Some(&entry.phone)).await {
                        warn!(id = %entry.id, error = %e, "scheduled send failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "cannot update schedule"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }
    info!("scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn fires_once_per_day() {
        let book = ScheduleBook::in_memory();
        let entry = book.schedule("09:30", "+1 (555) 000-1111", "standup", at(8, 0)).unwrap();
        assert_eq!(entry.phone, "+15550001111");
        assert_eq!(entry.last_run, None);

        assert!(book.take_due(at(9, 0)).unwrap().is_empty());
        assert_eq!(book.take_due(at(9, 30)).unwrap().len(), 1);
        assert!(book.take_due(at(18, 0)).unwrap().is_empty());

        let tomorrow = at(9, 45) + chrono::Duration::days(1);
        assert_eq!(book.take_due(tomorrow).unwrap().len(), 1);
    }

    #[test]
    fn past_time_waits_until_tomorrow() {
        let book = ScheduleBook::in_memory();
        book.schedule("07:00", "+15550001111", "hi", at(8, 0)).unwrap();
        assert!(book.take_due(at(23, 59)).unwrap().is_empty());
        assert_eq!(book.take_due(at(7, 0) + chrono::Duration::days(1)).unwrap().len(), 1);
    }

    #[test]
    fn rejects_bad_input() {
        let book = ScheduleBook::in_memory();
        assert!(book.schedule("25:00", "+1555", "x", at(8, 0)).is_err());
        assert!(book.schedule("9am", "+1555", "x", at(8, 0)).is_err());
        assert!(book.schedule("09:00", "", "x", at(8, 0)).is_err());
        assert!(book.schedule("09:00", "+1555", " ", at(8, 0)).is_err());
        assert!(book.list().is_empty());
    }

    #[test]
    fn remove_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let book = ScheduleBook::open(&path);
        let keep = book.schedule("10:00", "+1555", "a", at(8, 0)).unwrap();
        let drop = book.schedule("11:00", "+1555", "b", at(8, 0)).unwrap();
        assert!(book.remove(&drop.id).unwrap());
        assert!(!book.remove(&drop.id).unwrap());

        let reopened = ScheduleBook::open(&path);
        assert_eq!(reopened.list(), vec![keep]);
    }

    #[test]
    fn entries_added_by_another_book_survive_a_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let daemon = ScheduleBook::open(&path);
        daemon.schedule("09:00", "+15550001111", "daily", at(8, 0)).unwrap();

        let cli = ScheduleBook::open(&path);
        let added = cli.schedule("20:00", "+15550002222", "evening", at(8, 0)).unwrap();

        let due = daemon.take_due(at(9, 0)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "daily");

        let on_disk = ScheduleBook::open(&path).list();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.contains(&added));
        assert_eq!(daemon.list().len(), 2);

        assert!(daemon.remove(&added.id).unwrap());
        assert_eq!(cli.list().len(), 1);
    }
}
