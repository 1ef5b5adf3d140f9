// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tapback.toml` > `~/.config/tapback/tapback.toml` > `/etc/tapback/tapback.toml`
//! with environment variable overrides via `TAPBACK_` prefix. The conventional
//! unprefixed credential variables (`OPENAI_API_KEY`, `TAVILY_API_KEY`, ...) are
//! honored when the config leaves the matching key unset.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TapbackConfig;

/// Top-level sections addressable through `TAPBACK_<SECTION>_<KEY>`.
const SECTIONS: &[&str] = &["agent", "imessage", "openai", "search", "settings"];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tapback/tapback.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "tapback.toml";

/// `~/.config/tapback/tapback.toml`, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tapback/tapback.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tapback/tapback.toml`
/// 3. `~/.config/tapback/tapback.toml`
/// 4. `./tapback.toml`
/// 5. `TAPBACK_*` environment variables
/// 6. Unprefixed credential variables, only for keys still unset
pub fn load_config() -> Result<TapbackConfig, figment::Error> {
    let config: TapbackConfig = build_figment().extract()?;
    Ok(apply_legacy_env(config, |key| std::env::var(key).ok()))
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TapbackConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TapbackConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TapbackConfig, figment::Error> {
    let config: TapbackConfig = Figment::new()
        .merge(Serialized::defaults(TapbackConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()?;
    Ok(apply_legacy_env(config, |key| std::env::var(key).ok()))
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TapbackConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Fill unset credentials and flags from conventional environment variables.
///
/// `lookup` is injected so tests never touch the process environment.
pub fn apply_legacy_env<F>(mut config: TapbackConfig, lookup: F) -> TapbackConfig
where
    F: Fn(&str) -> Option<String>,
{
    let first = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| lookup(k))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    };

    if config.openai.api_key.is_none() {
        config.openai.api_key = first(&["OPENAI_API_KEY", "OPENAI_KEY"]);
    }
    if config.search.api_key.is_none() {
        config.search.api_key = first(&["TAVILY_API_KEY", "TAVILY_KEY"]);
    }
    if lookup("BOT_REPLAY_HISTORY").is_some_and(|v| v.trim() == "1") {
        config.agent.replay_history = true;
    }

    config.settings = config.settings.normalized();
    config
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// keys survive: `TAPBACK_SETTINGS_SEARCH_MAX_RESULTS` must become
/// `settings.search_max_results`, not `settings.search.max.results`.
///
/// Figment hands the key over with its original case, so it is lowercased
/// before matching section names.
fn env_provider() -> Env {
    Env::prefixed("TAPBACK_").map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

/// Map a lowercased, prefix-stripped env key onto a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_on_section() {
        assert_eq!(map_env_key("agent_log_level"), "agent.log_level");
        assert_eq!(
            map_env_key("settings_search_max_results"),
            "settings.search_max_results"
        );
        assert_eq!(map_env_key("search_api_key"), "search.api_key");
        assert_eq!(map_env_key("imessage_chat_db_path"), "imessage.chat_db_path");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn legacy_env_fills_unset_keys_only() {
        let mut config = TapbackConfig::default();
        config.search.api_key = Some("from-file".into());

        let config = apply_legacy_env(config, |key| match key {
            "OPENAI_KEY" => Some("sk-env".into()),
            "TAVILY_API_KEY" => Some("tv-env".into()),
            "BOT_REPLAY_HISTORY" => Some("1".into()),
            _ => None,
        });

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.search.api_key.as_deref(), Some("from-file"));
        assert!(config.agent.replay_history);
    }

    #[test]
    fn legacy_env_skips_blank_values() {
        let config = apply_legacy_env(TapbackConfig::default(), |key| match key {
            "OPENAI_API_KEY" => Some("   ".into()),
            "OPENAI_KEY" => Some("sk-second".into()),
            _ => None,
        });
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-second"));
        assert!(!config.agent.replay_history);
    }
}
