//! History command - browse previous scans.

use anyhow::Context;
use clap::{Args, Subcommand};
use console::style;

use receipt_core::{FileHistory, HistoryBrowser, HistoryStore, Selector};

use super::{config_path, copy_to_clipboard, history_path, load_config};

/// Arguments for the history command.
#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    command: HistoryCommand,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved scans, newest first
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one saved scan
    Show {
        /// Position in the list (1 = newest) or scan id
        entry: String,

        /// Copy the text to the clipboard
        #[arg(long)]
        copy: bool,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the history file path
    Path,
}

pub async fn run(args: HistoryArgs, config_override: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(&config_path(config_override))?;
    let path = history_path(&config);
    let locale = config.ui.locale;

    let history = FileHistory::open_path(&path)
        .with_context(|| format!("Cannot read history file {}", path.display()))?;
    let browser = HistoryBrowser::over(&history, locale);

    match args.command {
        HistoryCommand::List { json } => {
            let entries = browser.entries();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("{}", locale.history_empty());
            } else {
                for entry in entries {
                    println!(
                        "{:>3}  {}  {}",
                        style(entry.position).bold(),
                        style(&entry.date).dim(),
                        entry.summary
                    );
                }
            }
        }
        HistoryCommand::Show { entry, copy, json } => {
            let record = browser
                .select(&Selector::parse(&entry))
                .ok_or_else(|| anyhow::anyhow!("No scan found for '{}'", entry))?;

            if json {
                println!("{}", serde_json::to_string_pretty(record)?);
            } else {
                println!("{} {}", style("Scanned:").dim(), record.display_date());
                println!("{} {}", style("Id:").dim(), record.id());
                println!();
                println!("{}", record.extracted_text());
            }

            if copy {
                copy_to_clipboard(record.extracted_text())?;
                eprintln!("{} {}", style("✓").green(), locale.copied());
            }
        }
        HistoryCommand::Path => {
            println!("History file: {}", path.display());
            println!("Scans: {}", history.len());
        }
    }

    Ok(())
}
