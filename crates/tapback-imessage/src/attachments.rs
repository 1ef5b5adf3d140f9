// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment classification.
//!
//! Messages records a MIME type, a uniform type identifier, and a filename,
//! any of which may be missing or wrong. A row qualifies if any one signal
//! says so.

use std::path::Path;

use tapback_core::AttachmentKind;

/// Matched as substrings. Bare `heic` also covers vendor HEIC identifiers.
const IMAGE_UTIS: &[&str] = &["public.jpeg", "public.png", "public.tiff", "heic"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "heic", "tif", "tiff", "webp"];

/// Whether a row looks like an image.
pub fn is_image(mime: Option<&str>, uti: Option<&str>, filename: Option<&str>) -> bool {
    let mime = mime.unwrap_or_default().to_ascii_lowercase();
    let uti = uti.unwrap_or_default().to_ascii_lowercase();

    mime.starts_with("image/")
        || IMAGE_UTIS.iter().any(|u| uti.contains(u))
        || extension(filename).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a row looks like a PDF.
pub fn is_pdf(mime: Option<&str>, uti: Option<&str>, filename: Option<&str>) -> bool {
    mime.is_some_and(|m| m.eq_ignore_ascii_case("application/pdf"))
        || uti.is_some_and(|u| u.to_ascii_lowercase().contains("pdf"))
        || extension(filename).is_some_and(|ext| ext == "pdf")
}

/// Dispatch on [`AttachmentKind`].
pub fn matches(kind: AttachmentKind, mime: Option<&str>, uti: Option<&str>, filename: Option<&str>) -> bool {
    match kind {
        AttachmentKind::Image => is_image(mime, uti, filename),
        AttachmentKind::Pdf => is_pdf(mime, uti, filename),
    }
}

fn extension(filename: Option<&str>) -> Option<String> {
    Path::new(filename?)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
