// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tapback agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tapback_core::AiSettings;

/// Top-level Tapback configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TapbackConfig {
    /// Process-level behavior: logging, polling cadence, timeouts.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Local Messages.app integration.
    #[serde(default)]
    pub imessage: IMessageConfig,

    /// OpenAI API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Web search backend settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Initial AI settings, used until a persisted settings file exists.
    #[serde(default)]
    pub settings: AiSettings,
}

/// Agent process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between chat store polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between scheduled-message checks.
    #[serde(default = "default_scheduler_interval_secs")]
    pub scheduler_interval_secs: u64,

    /// Start from an empty watermark and process the whole backlog.
    #[serde(default)]
    pub replay_history: bool,

    /// Maximum audit log entries retained in memory.
    #[serde(default = "default_audit_log_capacity")]
    pub audit_log_capacity: usize,

    /// Upper bound on any single model or search call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            poll_interval_secs: default_poll_interval_secs(),
            scheduler_interval_secs: default_scheduler_interval_secs(),
            replay_history: false,
            audit_log_capacity: default_audit_log_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_agent_name() -> String {
    "tapback".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_scheduler_interval_secs() -> u64 {
    30
}

fn default_audit_log_capacity() -> usize {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Messages.app integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IMessageConfig {
    /// Path to the Messages SQLite database. `~` is expanded.
    #[serde(default = "default_chat_db_path")]
    pub chat_db_path: String,

    /// Directory for watermark state, persisted settings, and converted images.
    #[serde(default = "default_support_dir")]
    pub support_dir: String,

    /// Look up participant names in Contacts.app.
    #[serde(default = "default_true")]
    pub enable_contacts_lookup: bool,

    #[serde(default = "default_osascript_path")]
    pub osascript_path: String,

    #[serde(default = "default_sips_path")]
    pub sips_path: String,
}

impl Default for IMessageConfig {
    fn default() -> Self {
        Self {
            chat_db_path: default_chat_db_path(),
            support_dir: default_support_dir(),
            enable_contacts_lookup: true,
            osascript_path: default_osascript_path(),
            sips_path: default_sips_path(),
        }
    }
}

impl IMessageConfig {
    pub fn chat_db_path(&self) -> PathBuf {
        expand_tilde(&self.chat_db_path)
    }

    pub fn support_dir(&self) -> PathBuf {
        expand_tilde(&self.support_dir)
    }

    /// Watermark state file.
    pub fn state_path(&self) -> PathBuf {
        self.support_dir().join("state.json")
    }

    /// Persisted AI settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.support_dir().join("settings.json")
    }

    /// Scheduled message file.
    pub fn schedule_path(&self) -> PathBuf {
        self.support_dir().join("schedule.json")
    }

    /// Scratch directory for converted images.
    pub fn image_tmp_dir(&self) -> PathBuf {
        self.support_dir().join("tmp_images")
    }
}

fn default_chat_db_path() -> String {
    "~/Library/Messages/chat.db".to_string()
}

fn default_support_dir() -> String {
    "~/Library/Application Support/tapback".to_string()
}

fn default_true() -> bool {
    true
}

fn default_osascript_path() -> String {
    "osascript".to_string()
}

fn default_sips_path() -> String {
    "sips".to_string()
}

/// OpenAI API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. Falls back to `OPENAI_API_KEY` / `OPENAI_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Retries for rate-limit and server errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            max_retries: default_max_retries(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_retries() -> u32 {
    1
}

/// Web search configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Tavily API key. Falls back to `TAVILY_API_KEY` / `TAVILY_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}
