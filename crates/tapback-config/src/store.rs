// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-reloadable AI settings with copy-on-write snapshots.
//!
//! Readers take an `Arc` snapshot that stays valid for the whole poll cycle
//! or command even if an update lands meanwhile. Writers are serialized,
//! normalize the new value, persist it, then swap it in.
//!
//! The settings file is shared between the running agent and the admin CLI.
//! Each snapshot checks the file and swaps in its contents when they differ
//! from what this store last read or wrote, and each write starts from the
//! file's current contents.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tapback_core::settings::normalize_allow_list;
use tapback_core::{AiSettings, AiSettingsPatch, SettingsProvider, TapbackError};
use tracing::{debug, info, warn};

/// Owner of the current [`AiSettings`].
pub struct SettingsStore {
    current: ArcSwap<AiSettings>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
    /// File contents last loaded or persisted by this store.
    last_raw: Mutex<Option<String>>,
}

impl SettingsStore {
    /// In-memory store with no persistence.
    pub fn in_memory(initial: AiSettings) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial.normalized()),
            path: None,
            write_lock: Mutex::new(()),
            last_raw: Mutex::new(None),
        }
    }

    /// Open a store backed by a JSON file.
    ///
    /// A missing file starts from `seed`. An unreadable or corrupt file is
    /// logged and also falls back to `seed` rather than blocking startup.
    pub fn open(path: impl Into<PathBuf>, seed: AiSettings) -> Self {
        let path = path.into();
        let mut last_raw = None;
        let initial = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<AiSettings>(last_raw.insert(raw).as_str()) {
                Ok(settings) => {
                    debug!(path = %path.display(), "loaded persisted settings");
                    settings
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt settings file");
                    seed
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => seed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings file");
                seed
            }
        };

        Self {
            current: ArcSwap::from_pointee(initial.normalized()),
            path: Some(path),
            write_lock: Mutex::new(()),
            last_raw: Mutex::new(last_raw),
        }
    }

    /// Apply a partial update. Numeric fields are clamped, not rejected.
    pub fn update(&self, patch: AiSettingsPatch) -> Result<Arc<AiSettings>, TapbackError> {
        self.write(|base| patch.apply(base))
    }

    /// Replace the allow-list. Entries are normalized, deduplicated, and sorted.
    pub fn set_allowed_users<S: AsRef<str>>(
        &self,
        users: &[S],
    ) -> Result<Arc<AiSettings>, TapbackError> {
        let normalized = normalize_allow_list(users);
        self.write(move |base| AiSettings {
            allowed_users: normalized,
            ..base.clone()
        })
    }

    fn write<F>(&self, f: F) -> Result<Arc<AiSettings>, TapbackError>
    where
        F: FnOnce(&AiSettings) -> AiSettings,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| TapbackError::Internal("settings write lock poisoned".into()))?;

        self.reload_if_changed();
        let next = Arc::new(f(&self.current.load()).normalized());
        if let Some(path) = &self.path {
            let raw = persist(path, &next)?;
            if let Ok(mut last) = self.last_raw.lock() {
                *last = Some(raw);
            }
        }
        self.current.store(Arc::clone(&next));
        info!(
            model = %next.model,
            allowed = next.allowed_users.len(),
            context_window = next.context_window,
            "settings updated"
        );
        Ok(next)
    }

    /// Swap in the file's contents if another writer changed it. A missing
    /// or corrupt file keeps the current value.
    fn reload_if_changed(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let Ok(raw) = std::fs::read_to_string(path) else {
            return;
        };
        let Ok(mut last) = self.last_raw.lock() else {
            return;
        };
        if last.as_deref() == Some(raw.as_str()) {
            return;
        }
        match serde_json::from_str::<AiSettings>(&raw) {
            Ok(settings) => {
                let settings = settings.normalized();
                info!(
                    path = %path.display(),
                    allowed = settings.allowed_users.len(),
                    context_window = settings.context_window,
                    "settings file changed, reloaded"
                );
                self.current.store(Arc::new(settings));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring corrupt settings file"),
        }
        *last = Some(raw);
    }
}

impl SettingsProvider for SettingsStore {
    fn snapshot(&self) -> Arc<AiSettings> {
        self.reload_if_changed();
        self.current.load_full()
    }
}

/// Write via a temp file and rename so readers never observe a partial file.
/// Returns the JSON written.
fn persist(path: &Path, settings: &AiSettings) -> Result<String, TapbackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TapbackError::storage)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(TapbackError::storage)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(TapbackError::storage)?;
    std::fs::rename(&tmp, path).map_err(TapbackError::storage)?;
    Ok(json)
}
