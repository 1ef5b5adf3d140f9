// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text extraction from whichever response shape the backend returned.

use serde_json::Value;

/// Pull output text from a Responses or Chat Completions body.
///
/// Priority: top-level `output_text`, then concatenated
/// `output[].content[].text`, then `choices[0].message.content`.
/// Returns an empty string when none are present.
pub fn extract_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str)
        && !text.is_empty()
    {
        return text.to_string();
    }

    let parts: String = response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|content| content.get("text").and_then(Value::as_str))
        .collect();
    if !parts.is_empty() {
        return parts;
    }

    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_output_text() {
        let body = json!({"output_text": "direct", "output": [{"content": [{"text": "nested"}]}]});
        assert_eq!(extract_text(&body), "direct");
    }

    #[test]
    fn concatenates_structured_output() {
        let body = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Hel"}, {"type": "output_text", "text": "lo"}]}
            ]
        });
        assert_eq!(extract_text(&body), "Hello");
    }

    #[test]
    fn reads_chat_completion_shape() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "4"}}]});
        assert_eq!(extract_text(&body), "4");
    }

    #[test]
    fn unknown_shape_is_empty() {
        assert_eq!(extract_text(&json!({"id": "x"})), "");
        assert_eq!(extract_text(&json!(null)), "");
        assert_eq!(extract_text(&json!({"output_text": ""})), "");
    }
}
