// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical comparison keys for sender addresses.
//!
//! Every allow-list write, allow-list lookup, and sender comparison goes
//! through [`normalize_handle`]. Using any other form for one of those
//! three makes filtering fail silently.

/// Canonicalize a phone number.
///
/// Strips a case-insensitive `tel:` scheme, keeps a single leading `+` and
/// drops every other non-digit. Returns an empty string when no digits remain.
pub fn normalize_phone(raw: &str) -> String {
    let mut rest = raw.trim();
    if rest.get(..4).is_some_and(|scheme| scheme.eq_ignore_ascii_case("tel:")) {
        rest = rest[4..].trim_start();
    }

    let plus = rest.starts_with('+');
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }

    if plus { format!("+{digits}") } else { digits }
}

/// Canonicalize a handle: lower-cased email-style addresses, phone digits otherwise.
pub fn normalize_handle(raw: &str) -> String {
    if raw.contains('@') {
        raw.trim().to_lowercase()
    } else {
        normalize_phone(raw)
    }
}
