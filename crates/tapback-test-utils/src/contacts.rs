// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory contact book and media converter stand-ins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tapback_core::{ContactResolver, MediaConverter, TapbackError, normalize_handle};

/// Fixed handle-to-name map.
#[derive(Default)]
pub struct StaticContacts {
    names: HashMap<String, String>,
}

impl StaticContacts {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            names: entries
                .into_iter()
                .map(|(handle, name)| (normalize_handle(handle), name.to_string()))
                .collect(),
        }
    }
}

impl ContactResolver for StaticContacts {
    fn display_name(&self, handle: &str) -> Option<String> {
        self.names.get(&normalize_handle(handle)).cloned()
    }
}

/// Converter that copies the input bytes to a `.jpg` sibling in `out_dir`,
/// or always fails when built with [`CopyConverter::failing`].
pub struct CopyConverter {
    out_dir: Option<PathBuf>,
}

impl CopyConverter {
    pub fn into_dir(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: Some(out_dir.into()),
        }
    }

    pub fn failing() -> Self {
        Self { out_dir: None }
    }
}

#[async_trait]
impl MediaConverter for CopyConverter {
    async fn convert_to_jpeg(&self, input: &Path) -> Result<PathBuf, TapbackError> {
        let Some(dir) = &self.out_dir else {
            return Err(TapbackError::Internal("conversion unavailable".into()));
        };
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let out = dir.join(format!("{stem}.jpg"));
        tokio::fs::copy(input, &out).await.map_err(TapbackError::storage)?;
        Ok(out)
    }
}
