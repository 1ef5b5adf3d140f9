// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tapback - an iMessage agent that answers trigger-tagged messages.
//!
//! This is the binary entry point for the Tapback agent.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tapback_config::{ConfigError, TapbackConfig};

/// Tapback - an iMessage agent that answers trigger-tagged messages.
#[derive(Parser, Debug)]
#[command(name = "tapback", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start polling Messages and answering triggers.
    Serve,
    /// Check that the Messages database is readable.
    Status {
        /// Print the health report as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Send a message now.
    Send {
        text: String,
        /// Phone number or email of the recipient.
        #[arg(long, conflicts_with = "chat")]
        to: Option<String>,
        /// Chat GUID of a conversation.
        #[arg(long)]
        chat: Option<String>,
    },
    /// Show or change the AI settings.
    Settings {
        #[command(subcommand)]
        action: Option<admin::SettingsAction>,
    },
    /// Manage daily scheduled messages.
    Schedule {
        #[command(subcommand)]
        action: admin::ScheduleAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            tapback_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Send { text, to, chat }) => {
            admin::run_send(&config, &text, to.as_deref(), chat.as_deref()).await
        }
        Some(Commands::Settings { action }) => admin::run_settings(&config, action),
        Some(Commands::Schedule { action }) => admin::run_schedule(&config, action),
        None => {
            println!("tapback: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<TapbackConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tapback_config::load_and_validate_path(path),
        None => tapback_config::load_and_validate(),
    }
}
