// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message body decoding.
//!
//! Recent macOS versions leave `message.text` empty and store the body in
//! `attributedBody`, an `NSAttributedString` archived as a typedstream.
//! Only the backing `NSString` is needed, so rather than parse the whole
//! archive this locates the string object and reads its length-prefixed
//! UTF-8 payload.

const NSSTRING_MARKER: &[u8] = b"NSString";

/// Typedstream tag preceding an inline C string.
const STRING_TAG: u8 = b'+';

/// How far past the class name the string tag may sit.
const TAG_SEARCH_WINDOW: usize = 16;

/// Length prefix tags: the next 2 or 4 bytes hold a little-endian length.
const LEN_I16: u8 = 0x81;
const LEN_I32: u8 = 0x82;

/// Extract the plain text of an archived attributed string.
///
/// Returns `None` for any blob that does not look like a typedstream
/// `NSString`. Never panics on malformed input.
pub fn decode_attributed_body(blob: &[u8]) -> Option<String> {
    let marker = find(blob, NSSTRING_MARKER)? + NSSTRING_MARKER.len();
    let window_end = (marker + TAG_SEARCH_WINDOW).min(blob.len());
    let tag = marker + blob.get(marker..window_end)?.iter().position(|b| *b == STRING_TAG)?;

    let mut cursor = tag + 1;
    let len = match *blob.get(cursor)? {
        LEN_I16 => {
            let bytes = blob.get(cursor + 1..cursor + 3)?;
            cursor += 3;
            u16::from_le_bytes([bytes[0], bytes[1]]) as usize
        }
        LEN_I32 => {
            let bytes = blob.get(cursor + 1..cursor + 5)?;
            cursor += 5;
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
        }
        n => {
            cursor += 1;
            n as usize
        }
    };

    let payload = blob.get(cursor..cursor.checked_add(len)?)?;
    let text = String::from_utf8_lossy(payload).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Body text for a row: decoded archive first, then the plain column, then empty.
pub fn message_text(attributed_body: Option<&[u8]>, plain: Option<&str>) -> String {
    attributed_body
        .and_then(decode_attributed_body)
        .or_else(|| plain.map(|p| p.trim().to_string()))
        .unwrap_or_default()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
