// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tapback serve` command implementation.
//!
//! Wires the Messages.app adapters, the OpenAI provider, and Tavily search
//! into an [`Agent`], then polls until SIGINT or SIGTERM.

use std::sync::Arc;

use tapback_agent::{Agent, AgentParts, BroadcastSink, shutdown};
use tapback_config::TapbackConfig;
use tapback_core::{AgentEvent, ContactResolver, TapbackError, WebSearch};
use tapback_imessage::{AppleScriptSender, ChatDbReader, ContactsApp, SipsConverter};
use tapback_openai::OpenAiProvider;
use tapback_search::TavilyClient;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Crates whose logs follow `agent.log_level`; everything else logs warnings only.
const LOG_TARGETS: &[&str] = &[
    "tapback",
    "tapback_agent",
    "tapback_config",
    "tapback_core",
    "tapback_imessage",
    "tapback_openai",
    "tapback_search",
];

/// Runs the `tapback serve` command.
pub async fn run_serve(config: TapbackConfig) -> Result<(), TapbackError> {
    init_tracing(&config.agent.log_level);

    info!("starting tapback serve");

    let support_dir = config.imessage.support_dir();
    std::fs::create_dir_all(&support_dir).map_err(|e| {
        TapbackError::Config(format!(
            "cannot create support directory {}: {e}",
            support_dir.display()
        ))
    })?;

    let sink = Arc::new(BroadcastSink::default());
    tokio::spawn(log_events(sink.subscribe()));

    let parts = build_parts(&config, sink)?;
    let agent = Agent::from_config(&config, parts);

    let health = agent.health().await;
    if let Some(error) = &health.source_error {
        warn!(error = %error, "Messages database not readable yet, will keep retrying");
    }

    let cancel = shutdown::install_signal_handler();
    agent.run(cancel).await
}

/// Build the production adapters from config.
fn build_parts(config: &TapbackConfig, sink: Arc<BroadcastSink>) -> Result<AgentParts, TapbackError> {
    let imessage = &config.imessage;

    let contacts: Option<Arc<dyn ContactResolver>> = imessage
        .enable_contacts_lookup
        .then(|| Arc::new(ContactsApp::new(&imessage.osascript_path)) as Arc<dyn ContactResolver>);

    let mut reader = ChatDbReader::new(imessage.chat_db_path());
    if let Some(contacts) = &contacts {
        reader = reader.with_contacts(Arc::clone(contacts));
    }

    let provider = OpenAiProvider::new(
        config.openai.api_key.as_deref(),
        &config.openai.base_url,
        config.openai.max_retries,
    )?;
    let search = TavilyClient::new(config.search.api_key.clone())?.with_base_url(&config.search.base_url);
    if !search.is_configured() {
        info!("no Tavily API key, web search disabled");
    }

    Ok(AgentParts {
        source: Arc::new(reader),
        sender: Arc::new(AppleScriptSender::new(&imessage.osascript_path)),
        provider: Arc::new(provider),
        search: Arc::new(search),
        sink,
        converter: Arc::new(SipsConverter::new(&imessage.sips_path, imessage.image_tmp_dir())),
        contacts,
    })
}

/// Mirror agent events into the log until the sink is dropped.
async fn log_events(mut rx: broadcast::Receiver<AgentEvent>) {
    loop {
        match rx.recv().await {
            Ok(AgentEvent::AgentError { kind, error, hint }) => {
                warn!(kind = %kind, error = %error, hint = hint.as_deref().unwrap_or(""), "agent error");
            }
            Ok(AgentEvent::AiStream { .. }) => {}
            Ok(event) => debug!(event = event.name(), "agent event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the config level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn default_filter(log_level: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}
