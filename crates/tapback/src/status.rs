// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tapback status` command implementation.
//!
//! Opens the Messages database the same way the poll loop does and reports
//! whether it is readable, along with the persisted watermark.

use std::io::IsTerminal;

use tapback_agent::Watermark;
use tapback_config::TapbackConfig;
use tapback_core::{ChatSource, HealthReport, TapbackError};
use tapback_imessage::ChatDbReader;

/// Build a health report without starting the agent.
pub async fn health_report(config: &TapbackConfig) -> HealthReport {
    let reader = ChatDbReader::new(config.imessage.chat_db_path());
    let reachability = reader.check_reachability().await;
    let watermark = Watermark::load(config.imessage.state_path());
    HealthReport {
        ok: reachability.is_ok(),
        source_ok: reachability.is_ok(),
        source_error: reachability.err().map(|e| e.to_string()),
        last_seen_timestamp: watermark.get(),
    }
}

/// Run the `tapback status` command.
///
/// If `--json` is passed, outputs the health report as JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &TapbackConfig, json: bool, plain: bool) -> Result<(), TapbackError> {
    let report = health_report(config).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(config, &report, use_color);
    }
    Ok(())
}

fn print_report(config: &TapbackConfig, report: &HealthReport, use_color: bool) {
    println!();
    println!("  tapback status");
    println!("  {}", "-".repeat(35));

    let db = config.imessage.chat_db_path();
    match (&report.source_error, use_color) {
        (None, true) => {
            use colored::Colorize;
            println!("    Database: {} {}", "✓".green(), db.display());
        }
        (None, false) => println!("    Database: [OK] {}", db.display()),
        (Some(error), true) => {
            use colored::Colorize;
            println!("    Database: {} {}", "✗".red(), error.red());
        }
        (Some(error), false) => println!("    Database: [FAIL] {error}"),
    }
    println!("    Last seen: {}", report.last_seen_timestamp);

    if report.source_error.is_some() {
        println!();
        println!("  Grant Full Disk Access to your terminal in System Settings");
        println!("  → Privacy & Security → Full Disk Access.");
    }
    println!();
}
