// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image format conversion for formats the model backend cannot ingest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TapbackError;

#[async_trait]
pub trait MediaConverter: Send + Sync + 'static {
    /// Convert an image to JPEG and return the path of the converted copy.
    async fn convert_to_jpeg(&self, input: &Path) -> Result<PathBuf, TapbackError>;
}
