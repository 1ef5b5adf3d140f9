// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tapback configuration system.

use tapback_config::diagnostic::ConfigError;
use tapback_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tapback_config() {
    let toml = r#"
[agent]
name = "desk-mac"
log_level = "debug"
poll_interval_secs = 3
replay_history = true

[imessage]
chat_db_path = "/tmp/chat.db"
support_dir = "/tmp/tapback"
enable_contacts_lookup = false

[openai]
api_key = "sk-test"
base_url = "http://localhost:9999/v1"

[search]
api_key = "tvly-test"

[settings]
trigger_tag = "@bot"
allowed_users = ["+1 555 000 1111"]
model = "gpt-4.1-mini"
enable_search = true
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.agent.name, "desk-mac");
    assert_eq!(config.agent.poll_interval_secs, 3);
    assert!(config.agent.replay_history);
    assert_eq!(config.agent.scheduler_interval_secs, 30);
    assert_eq!(config.imessage.chat_db_path, "/tmp/chat.db");
    assert!(!config.imessage.enable_contacts_lookup);
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.search.api_key.as_deref(), Some("tvly-test"));
    assert_eq!(config.settings.trigger_tag, "@bot");
    assert_eq!(config.settings.allowed_users, vec!["+15550001111"]);
    assert!(config.settings.enable_search);
}

/// An empty file yields the documented defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.agent.poll_interval_secs, 5);
    assert_eq!(config.settings.trigger_tag, "@ai");
    assert_eq!(config.settings.model, "gpt-4o-mini");
    assert_eq!(config.settings.context_window, 25);
    assert_eq!(config.settings.search_cache_ttl, 120);
    assert!(config.imessage.chat_db_path.ends_with("Library/Messages/chat.db"));
}

/// Out-of-range AI settings are clamped, not rejected.
#[test]
fn out_of_range_settings_are_clamped() {
    let toml = r#"
[settings]
context_window = 500
image_chunk_size = 0
search_max_results = 50
"#;
    let config = load_and_validate_str(toml).expect("clamped, not rejected");
    assert_eq!(config.settings.context_window, 100);
    assert_eq!(config.settings.image_chunk_size, 1);
    assert_eq!(config.settings.search_max_results, 10);
}

/// Unknown keys produce a diagnostic with a suggestion.
#[test]
fn unknown_key_in_settings_suggests_correction() {
    let toml = r#"
[settings]
triger_tag = "@ai"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "triger_tag");
            assert_eq!(suggestion.as_deref(), Some("trigger_tag"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Wrong value types are reported with the offending key.
#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[agent]
poll_interval_secs = "fast"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "got {errors:?}"
    );
}

/// Semantic validation failures are returned together.
#[test]
fn validation_errors_are_collected() {
    let toml = r#"
[agent]
poll_interval_secs = 0
log_level = "chatty"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// `TAPBACK_*` variables override the file, and underscore keys stay intact.
#[test]
#[serial_test::serial]
fn prefixed_env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tapback.toml");
    std::fs::write(
        &path,
        "[agent]\npoll_interval_secs = 9\n\n[settings]\nsearch_max_results = 3\n",
    )
    .unwrap();

    // SAFETY: serialized with every other env-mutating test.
    unsafe {
        std::env::set_var("TAPBACK_AGENT_POLL_INTERVAL_SECS", "2");
        std::env::set_var("TAPBACK_SETTINGS_SEARCH_MAX_RESULTS", "7");
    }
    let result = tapback_config::loader::load_config_from_path(&path);
    unsafe {
        std::env::remove_var("TAPBACK_AGENT_POLL_INTERVAL_SECS");
        std::env::remove_var("TAPBACK_SETTINGS_SEARCH_MAX_RESULTS");
    }

    let config = result.expect("env overrides should merge");
    assert_eq!(config.agent.poll_interval_secs, 2);
    assert_eq!(config.settings.search_max_results, 7);
}
