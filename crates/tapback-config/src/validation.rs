// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Only static process settings are rejected here. AI settings that are out
//! of range are clamped by [`tapback_core::AiSettings::normalized`] instead.

use crate::diagnostic::ConfigError;
use crate::model::TapbackConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TapbackConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.to_lowercase().as_str()) {
        errors.push(ConfigError::invalid(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    for (key, value) in [
        ("agent.poll_interval_secs", config.agent.poll_interval_secs),
        ("agent.scheduler_interval_secs", config.agent.scheduler_interval_secs),
        ("agent.request_timeout_secs", config.agent.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::invalid(format!("{key} must be at least 1")));
        }
    }

    if config.agent.audit_log_capacity == 0 {
        errors.push(ConfigError::invalid("agent.audit_log_capacity must be at least 1"));
    }

    for (key, value) in [
        ("imessage.chat_db_path", &config.imessage.chat_db_path),
        ("imessage.support_dir", &config.imessage.support_dir),
        ("imessage.osascript_path", &config.imessage.osascript_path),
        ("imessage.sips_path", &config.imessage.sips_path),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::invalid(format!("{key} must not be empty")));
        }
    }

    for (key, value) in [
        ("openai.base_url", &config.openai.base_url),
        ("search.base_url", &config.search.base_url),
    ] {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            errors.push(ConfigError::invalid(format!(
                "{key} `{value}` must be an http(s) URL"
            )));
        }
    }

    if config.settings.model.trim().is_empty() {
        errors.push(ConfigError::invalid("settings.model must not be empty"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
