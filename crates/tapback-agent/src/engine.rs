// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response generation for triggered commands.
//!
//! Every public entry point returns the reply text and never an error:
//! failures become a short user-facing message so the dispatcher always has
//! something to send. Each call takes an [`AiSettings`] snapshot so a
//! settings update never changes the model or limits halfway through a
//! reply.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tapback_core::settings::{clamp_context_window, clamp_image_chunk, clamp_search_results};
use tapback_core::types::{
    Continuation, InputPart, ModelRequest, ModelStreamEvent, ToolOutput, ToolSpec,
};
use tapback_core::{
    AgentEvent, AiSettings, ChatSource, EventSink, MediaConverter, ModelProvider, StreamPayload,
    TapbackError,
};
use tapback_search::{CachedSearch, format_fast_path, format_prefetch, should_force_search};
use tracing::{debug, info, warn};

use crate::context::format_context;
use crate::documents::read_pdf_text;
use crate::media::encode_data_url;
use crate::toolcall::{ToolCall, ToolCallTracker};

/// Name of the search tool offered to the model.
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Upper bound on model turns spent answering tool calls.
const MAX_TOOL_ROUNDS: usize = 4;

const DEFAULT_IMAGE_PROMPT: &str = "Describe the image(s) clearly and concisely.";
const DEFAULT_SUMMARY_PROMPT: &str = "Give a concise summary (5-7 bullets or 1 short paragraph). \
     Focus on the main points, claims, and any important numbers.";
const UNREADABLE_IMAGES: &str = "I couldn't read any shared images (unsupported format). \
     Please resend as JPEG/PNG/WebP or say 'convert and describe' and I'll try again.";
const UNREADABLE_PDFS: &str =
    "I couldn't read the PDF(s). They may be scanned/image-only or protected.";

/// Who a streamed reply is for. Used to label `ai_stream` events and to
/// pick the conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamContext {
    pub phone: String,
    pub chat_guid: Option<String>,
    pub requester: Option<String>,
}

/// Produces replies using the model backend, chat history, and web search.
pub struct ResponseEngine {
    provider: Arc<dyn ModelProvider>,
    source: Arc<dyn ChatSource>,
    search: Arc<CachedSearch>,
    sink: Arc<dyn EventSink>,
    converter: Arc<dyn MediaConverter>,
    timeout: Duration,
}

impl ResponseEngine {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        source: Arc<dyn ChatSource>,
        search: Arc<CachedSearch>,
        sink: Arc<dyn EventSink>,
        converter: Arc<dyn MediaConverter>,
    ) -> Self {
        Self {
            provider,
            source,
            search,
            sink,
            converter,
            timeout: Duration::from_secs(120),
        }
    }

    /// Bound every model and search call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One non-streaming completion of `command` with no history.
    pub async fn query_direct(&self, settings: &AiSettings, command: &str) -> String {
        if command.trim().is_empty() {
            return String::new();
        }
        match self.complete_text(settings, command).await {
            Ok(text) => text,
            Err(e) => format!("Error: {e}"),
        }
    }

    /// Stream a reply to `command`, emitting `ai_stream` deltas as they
    /// arrive, and return the full text.
    ///
    /// Time-sensitive commands go to web search first; when the results
    /// carry an answer or sources they are returned directly without a
    /// model call.
    pub async fn query_stream(
        &self,
        settings: &AiSettings,
        command: &str,
        ctx: &StreamContext,
        extra_context: Option<&str>,
    ) -> String {
        let command = command.trim();
        if command.is_empty() {
            return String::new();
        }

        let window = clamp_context_window(settings.context_window);
        let history = match ctx.chat_guid.as_deref() {
            Some(guid) => self
                .source
                .fetch_recent_messages(guid, window)
                .await
                .unwrap_or_else(|e| {
                    warn!(chat = %guid, error = %e, "history unavailable");
                    Vec::new()
                }),
            None => Vec::new(),
        };
        let context = format_context(&history, ctx.requester.as_deref(), window);

        let search_configured = settings.enable_search && self.search.is_configured();
        debug!(
            enable_search = settings.enable_search,
            configured = search_configured,
            "query_stream"
        );

        let mut prefetched = None;
        if search_configured && let Some(query) = should_force_search(command) {
            let k = clamp_search_results(settings.search_max_results);
            match self
                .bounded(self.search.cached_search(&query, k, settings.search_cache_ttl))
                .await
            {
                Ok(data) => {
                    if let Some(text) = format_fast_path(&data) {
                        info!(query = %query, "answered from web search");
                        self.emit_stream(ctx, StreamPayload::Done { text: text.clone() });
                        return text;
                    }
                    prefetched = Some(format_prefetch(&data));
                }
                Err(e) => prefetched = Some(format!("Web search unavailable: {e}")),
            }
        }

        let request_line = format!("User request: {command}");
        let input = [
            Some(context.trim()),
            extra_context.map(str::trim),
            prefetched.as_deref(),
            Some(request_line.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

        let request = ModelRequest {
            model: settings.model.clone(),
            instructions: Some(settings.system_prompt.clone()),
            input: vec![InputPart::text(input)],
            tools: if search_configured {
                vec![web_search_tool(settings)]
            } else {
                Vec::new()
            },
            continuation: None,
        };

        let streamed = self.bounded(self.stream_with_tools(settings, request, ctx)).await;
        match streamed {
            Ok(mut text) => {
                if text.trim().is_empty() {
                    debug!("stream produced no text, retrying without streaming");
                    match self.complete_text(settings, command).await {
                        Ok(fallback) => text = fallback,
                        Err(e) => warn!(error = %e, "fallback completion failed"),
                    }
                }
                self.emit_stream(ctx, StreamPayload::Done { text: text.clone() });
                text
            }
            Err(e) => {
                warn!(error = %e, "streamed reply failed");
                self.emit_stream(ctx, StreamPayload::Error { error: e.to_string() });
                format!("Error: {e}")
            }
        }
    }

    /// Describe images with the vision model, `image_chunk_size` images per
    /// request. Replies for each chunk are joined with blank lines.
    pub async fn describe_images(
        &self,
        settings: &AiSettings,
        paths: &[PathBuf],
        instruction: &str,
    ) -> String {
        if paths.is_empty() {
            return String::new();
        }
        let prompt = prompt_or(instruction, DEFAULT_IMAGE_PROMPT);

        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(url) = encode_data_url(path, self.converter.as_ref()).await {
                urls.push(url);
            }
        }
        if urls.is_empty() {
            return UNREADABLE_IMAGES.to_string();
        }

        let mut replies = Vec::new();
        for chunk in urls.chunks(clamp_image_chunk(settings.image_chunk_size)) {
            let mut input = vec![InputPart::text(prompt)];
            input.extend(chunk.iter().map(|url| InputPart::Image {
                data_url: url.clone(),
            }));
            let request = ModelRequest {
                model: settings.model.clone(),
                instructions: Some(settings.system_prompt.clone()),
                input,
                tools: Vec::new(),
                continuation: None,
            };
            match self.bounded(self.provider.complete(request)).await {
                Ok(text) if !text.trim().is_empty() => replies.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => return format!("Error describing image: {e}"),
            }
        }
        info!(images = urls.len(), "described images");
        replies.join("\n\n")
    }

    /// Summarize PDFs one at a time. A single document is labelled
    /// `name:\n...`; several are numbered.
    pub async fn summarize_pdfs(
        &self,
        settings: &AiSettings,
        paths: &[PathBuf],
        instruction: &str,
    ) -> String {
        match paths {
            [] => String::new(),
            [only] => {
                let summary = self.summarize_pdf(settings, only, instruction).await;
                if summary.is_empty() {
                    summary
                } else {
                    format!("{}:\n{summary}", file_name(only))
                }
            }
            many => {
                let mut parts = Vec::new();
                for (i, path) in many.iter().enumerate() {
                    let summary = self.summarize_pdf(settings, path, instruction).await;
                    if !summary.is_empty() {
                        parts.push(format!("{}. {}: {summary}", i + 1, file_name(path)));
                    }
                }
                parts.join("\n\n")
            }
        }
    }

    /// Summarize one PDF by file reference, falling back to local text
    /// extraction when upload or the file-aware endpoint is unavailable.
    async fn summarize_pdf(&self, settings: &AiSettings, path: &Path, instruction: &str) -> String {
        let prompt = prompt_or(instruction, DEFAULT_SUMMARY_PROMPT);

        match self.bounded(self.provider.upload_file(path)).await {
            Ok(file_id) => {
                let request = ModelRequest {
                    model: settings.model.clone(),
                    instructions: Some(settings.system_prompt.clone()),
                    input: vec![InputPart::text(prompt), InputPart::File { file_id }],
                    tools: Vec::new(),
                    continuation: None,
                };
                match self.bounded(self.provider.complete(request)).await {
                    Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
                    Ok(_) => debug!(path = %path.display(), "empty file-reference summary"),
                    Err(e) => warn!(path = %path.display(), error = %e, "file-reference summary failed"),
                }
            }
            Err(e) => debug!(path = %path.display(), error = %e, "upload unavailable, extracting locally"),
        }

        let text = read_pdf_text(path).await;
        if text.is_empty() {
            return UNREADABLE_PDFS.to_string();
        }
        let request = ModelRequest::text(
            settings.model.clone(),
            settings.system_prompt.clone(),
            format!("{prompt}\n\n=== Document ===\n{text}"),
        );
        match self.bounded(self.provider.complete(request)).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => format!("Error summarizing document: {e}"),
        }
    }

    /// Run streamed turns, answering tool calls, until the model stops
    /// calling tools.
    async fn stream_with_tools(
        &self,
        settings: &AiSettings,
        mut request: ModelRequest,
        ctx: &StreamContext,
    ) -> Result<String, TapbackError> {
        let mut text = String::new();
        for round in 1..=MAX_TOOL_ROUNDS {
            let mut stream = self.provider.stream(request.clone()).await?;
            let mut tracker = ToolCallTracker::new();
            let mut response_id = None;

            while let Some(event) = stream.next().await {
                match event? {
                    ModelStreamEvent::TextDelta(delta) => {
                        if delta.is_empty() {
                            continue;
                        }
                        text.push_str(&delta);
                        self.emit_stream(ctx, StreamPayload::Delta { delta });
                    }
                    ModelStreamEvent::ToolCallOpened { call_id, name } => tracker.open(&call_id, &name),
                    ModelStreamEvent::ToolCallArgumentsDelta { call_id, delta } => {
                        tracker.append(&call_id, &delta)
                    }
                    ModelStreamEvent::ToolCallArgumentsDone { call_id, arguments } => {
                        tracker.complete(&call_id, &arguments)
                    }
                    ModelStreamEvent::Completed { response_id: id } => {
                        response_id = id;
                        break;
                    }
                }
            }

            tracker.pending();
            let calls = tracker.take_complete();
            if calls.is_empty() {
                return Ok(text);
            }
            let Some(previous_response_id) = response_id else {
                warn!(calls = calls.len(), "tool calls without a response id, ignoring");
                return Ok(text);
            };

            debug!(round, calls = calls.len(), "answering tool calls");
            let mut outputs = Vec::with_capacity(calls.len());
            for call in calls {
                outputs.push(self.run_tool(settings, call).await);
            }
            request.continuation = Some(Continuation {
                previous_response_id,
                outputs,
            });
        }
        warn!(rounds = MAX_TOOL_ROUNDS, "tool round limit reached");
        Ok(text)
    }

    async fn run_tool(&self, settings: &AiSettings, call: ToolCall) -> ToolOutput {
        let output = match call.name.as_str() {
            WEB_SEARCH_TOOL => {
                let args = call.parsed_arguments();
                let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
                let k = args
                    .get("k")
                    .and_then(Value::as_u64)
                    .map(|k| k as usize)
                    .unwrap_or(settings.search_max_results);
                info!(query = %query, k, "model requested web search");
                match self
                    .bounded(self.search.cached_search(
                        query,
                        clamp_search_results(k),
                        settings.search_cache_ttl,
                    ))
                    .await
                {
                    Ok(data) => serde_json::to_string(&data)
                        .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string()),
                    Err(e) => json!({ "error": e.to_string() }).to_string(),
                }
            }
            other => {
                warn!(tool = %other, "model called an unknown tool");
                json!({ "error": format!("unknown tool `{other}`") }).to_string()
            }
        };
        call.finish(output)
    }

    async fn complete_text(&self, settings: &AiSettings, command: &str) -> Result<String, TapbackError> {
        let request = ModelRequest::text(
            settings.model.clone(),
            settings.system_prompt.clone(),
            command,
        );
        self.bounded(self.provider.complete(request)).await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, TapbackError>>,
    ) -> Result<T, TapbackError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TapbackError::Timeout {
                duration: self.timeout,
            })?
    }

    fn emit_stream(&self, ctx: &StreamContext, payload: StreamPayload) {
        self.sink.emit(AgentEvent::AiStream {
            phone: ctx.phone.clone(),
            chat_guid: ctx.chat_guid.clone(),
            payload,
        });
    }
}

/// The `web_search` function tool definition.
pub fn web_search_tool(settings: &AiSettings) -> ToolSpec {
    ToolSpec {
        name: WEB_SEARCH_TOOL.to_string(),
        description: "Search the web for up-to-date information using Tavily".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "k": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10,
                    "default": clamp_search_results(settings.search_max_results),
                },
            },
            "required": ["query"],
        }),
    }
}

fn prompt_or<'a>(instruction: &'a str, default: &'a str) -> &'a str {
    match instruction.trim() {
        "" => default,
        given => given,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
