// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot administrative commands: `send`, `settings`, and `schedule`.
//!
//! These edit the settings and schedule files that `serve` shares. A
//! running agent sees the changes on its next poll or scheduler tick.

use chrono::Local;
use clap::Subcommand;
use tapback_agent::ScheduleBook;
use tapback_config::{SettingsStore, TapbackConfig};
use tapback_core::{AiSettingsPatch, MessageSender, OutboundTarget, SettingsProvider, TapbackError};
use tapback_imessage::AppleScriptSender;

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings as JSON.
    Show,
    /// Change one or more settings. Out-of-range numbers are clamped.
    Set {
        #[arg(long)]
        trigger_tag: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        context_window: Option<usize>,
        #[arg(long)]
        image_chunk_size: Option<usize>,
        #[arg(long)]
        enable_search: Option<bool>,
        #[arg(long)]
        search_max_results: Option<usize>,
        #[arg(long)]
        search_cache_ttl: Option<u64>,
    },
    /// Replace the allow-list. With no handles, nobody may trigger the agent.
    Allow { handles: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Send `message` to `phone` every day at `time` (HH:MM, local time).
    Add {
        time: String,
        phone: String,
        message: String,
    },
    /// List scheduled messages.
    List,
    /// Remove a scheduled message by id.
    Remove { id: String },
}

/// Send one message through Messages.app.
pub async fn run_send(
    config: &TapbackConfig,
    text: &str,
    to: Option<&str>,
    chat: Option<&str>,
) -> Result<(), TapbackError> {
    let (text, target) = send_target(text, to, chat)?;
    let sender = AppleScriptSender::new(&config.imessage.osascript_path);
    sender.send(text, &target).await?;
    println!("sent");
    Ok(())
}

fn send_target<'a>(
    text: &'a str,
    to: Option<&str>,
    chat: Option<&str>,
) -> Result<(&'a str, OutboundTarget), TapbackError> {
    if text.trim().is_empty() {
        return Err(TapbackError::InvalidInput("message is required".into()));
    }
    let target = OutboundTarget::from_parts(to, chat).ok_or_else(|| {
        TapbackError::InvalidInput("either --to or --chat is required".into())
    })?;
    Ok((text, target))
}

pub fn run_settings(config: &TapbackConfig, action: Option<SettingsAction>) -> Result<(), TapbackError> {
    let store = SettingsStore::open(config.imessage.settings_path(), config.settings.clone());
    let settings = match action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => store.snapshot(),
        SettingsAction::Set {
            trigger_tag,
            model,
            system_prompt,
            context_window,
            image_chunk_size,
            enable_search,
            search_max_results,
            search_cache_ttl,
        } => store.update(AiSettingsPatch {
            trigger_tag,
            model,
            system_prompt,
            context_window,
            image_chunk_size,
            enable_search,
            search_max_results,
            search_cache_ttl,
        })?,
        SettingsAction::Allow { handles } => store.set_allowed_users(&handles)?,
    };
    println!("{}", to_json(&*settings)?);
    Ok(())
}

pub fn run_schedule(config: &TapbackConfig, action: ScheduleAction) -> Result<(), TapbackError> {
    let book = ScheduleBook::open(config.imessage.schedule_path());
    match action {
        ScheduleAction::Add {
            time,
            phone,
            message,
        } => {
            let entry = book.schedule(&time, &phone, &message, Local::now().naive_local())?;
            println!("{}", to_json(&entry)?);
        }
        ScheduleAction::List => println!("{}", to_json(&book.list())?),
        ScheduleAction::Remove { id } => {
            if !book.remove(&id)? {
                return Err(TapbackError::InvalidInput(format!("no scheduled message with id {id}")));
            }
            println!("removed {id}");
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TapbackError> {
    serde_json::to_string_pretty(value).map_err(|e| TapbackError::Internal(e.to_string()))
}
