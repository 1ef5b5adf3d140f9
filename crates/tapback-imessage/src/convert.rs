// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image conversion through macOS `sips`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tapback_core::{MediaConverter, TapbackError};
use tracing::debug;

/// [`MediaConverter`] that shells out to `sips -s format jpeg`.
pub struct SipsConverter {
    sips: String,
    out_dir: PathBuf,
}

impl SipsConverter {
    pub fn new(sips: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            sips: sips.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Destination for a converted copy of `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.out_dir.join(format!("{stem}.jpg"))
    }
}

#[async_trait]
impl MediaConverter for SipsConverter {
    async fn convert_to_jpeg(&self, input: &Path) -> Result<PathBuf, TapbackError> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(TapbackError::storage)?;

        let out = self.output_path(input);
        let output = tokio::process::Command::new(&self.sips)
            .args(["-s", "format", "jpeg"])
            .arg(input)
            .arg("--out")
            .arg(&out)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TapbackError::Internal(format!("failed to launch {}: {e}", self.sips)))?;

        if !output.status.success() {
            return Err(TapbackError::Internal(format!(
                "sips exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(input = %input.display(), output = %out.display(), "converted image to jpeg");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_keeps_stem_in_out_dir() {
        let conv = SipsConverter::new("sips", "/tmp/tapback/tmp_images");
        assert_eq!(
            conv.output_path(Path::new("/x/IMG_0042.HEIC")),
            PathBuf::from("/tmp/tapback/tmp_images/IMG_0042.jpg")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let conv = SipsConverter::new("false", dir.path());
        assert!(conv.convert_to_jpeg(Path::new("/x/a.heic")).await.is_err());
    }
}
