// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text renderings of search results.

use tapback_core::SearchResponse;

fn score_suffix(score: Option<f64>) -> String {
    score.map(|s| format!(" ({s:.2})")).unwrap_or_default()
}

/// Results rendered as model context ahead of the user request.
pub fn format_prefetch(data: &SearchResponse) -> String {
    let mut lines = vec!["Web results (heuristic):".to_string()];
    let answer = data.answer.trim();
    if !answer.is_empty() {
        lines.push(format!("Answer: {answer}"));
    }
    for hit in &data.results {
        let title = hit.title.trim();
        let url = hit.url.trim();
        let content = hit.content.trim();
        if !title.is_empty() || !url.is_empty() {
            lines.push(format!("- {title}{} — {url}", score_suffix(hit.score)));
        }
        if !content.is_empty() {
            lines.push(format!("  {content}"));
        }
    }
    lines.join("\n")
}

/// A direct reply built from search results alone: the answer, then a
/// numbered source list. `None` when there is nothing to say.
pub fn format_fast_path(data: &SearchResponse) -> Option<String> {
    let mut lines = Vec::new();
    let answer = data.answer.trim();
    if !answer.is_empty() {
        lines.push(answer.to_string());
        lines.push(String::new());
    }
    for (i, hit) in data.results.iter().enumerate() {
        let title = hit.title.trim();
        let url = hit.url.trim();
        if !title.is_empty() && !url.is_empty() {
            lines.push(format!("{}. {title}{} — {url}", i + 1, score_suffix(hit.score)));
        }
    }
    let text = lines.join("\n");
    (!text.trim().is_empty()).then_some(text)
}
