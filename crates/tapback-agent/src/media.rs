// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image attachments encoded as `data:` URLs for vision input.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tapback_core::MediaConverter;
use tracing::warn;

/// MIME type for formats the model accepts directly, keyed by extension.
pub fn supported_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Encode one image, converting unsupported formats (HEIC, TIFF, ...) to
/// JPEG first. Returns `None` when the file cannot be read or converted.
pub async fn encode_data_url(path: &Path, converter: &dyn MediaConverter) -> Option<String> {
    let (path, mime) = match supported_mime(path) {
        Some(mime) => (path.to_path_buf(), mime),
        None => match converter.convert_to_jpeg(path).await {
            Ok(converted) => (converted, "image/jpeg"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "image conversion failed");
                return None;
            }
        },
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => Some(format!("data:{mime};base64,{}", STANDARD.encode(bytes))),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read image");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapback_test_utils::CopyConverter;

    #[test]
    fn recognizes_supported_extensions() {
        assert_eq!(supported_mime(Path::new("a/IMG_1.JPG")), Some("image/jpeg"));
        assert_eq!(supported_mime(Path::new("b.webp")), Some("image/webp"));
        assert_eq!(supported_mime(Path::new("c.heic")), None);
        assert_eq!(supported_mime(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn encodes_png_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, b"png!").unwrap();
        let url = encode_data_url(&path, &CopyConverter::failing()).await.unwrap();
        assert_eq!(url, "data:image/png;base64,cG5nIQ==");
    }

    #[tokio::test]
    async fn converts_unsupported_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.heic");
        std::fs::write(&path, b"heic").unwrap();
        let converter = CopyConverter::into_dir(dir.path());
        let url = encode_data_url(&path, &converter).await.unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn conversion_failure_skips_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.tiff");
        std::fs::write(&path, b"tiff").unwrap();
        assert!(encode_data_url(&path, &CopyConverter::failing()).await.is_none());
        assert!(encode_data_url(&dir.path().join("gone.png"), &CopyConverter::failing()).await.is_none());
    }
}
