//! Key command - select the API key used for extraction.

use std::fs;

use clap::{Args, Subcommand};
use console::style;

use receipt_core::{CredentialSource, EnvCredentials};

use super::{config_path, load_config};

/// Arguments for the key command.
#[derive(Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Store an API key in the config file
    Set {
        /// The API key
        key: String,
    },

    /// Remove the stored API key
    Clear,

    /// Show which key source would be used
    Status,
}

pub async fn run(args: KeyArgs, config_override: Option<&str>) -> anyhow::Result<()> {
    let path = config_path(config_override);
    let mut config = load_config(&path)?;

    match args.command {
        KeyCommand::Set { key } => {
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("API key must not be empty");
            }
            config.extraction.api_key = Some(key.to_string());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            config.save(&path)?;
            println!("{} API key saved to {}", style("✓").green(), path.display());
        }
        KeyCommand::Clear => {
            if config.extraction.api_key.take().is_none() {
                println!("{} No stored API key.", style("ℹ").blue());
                return Ok(());
            }
            config.save(&path)?;
            println!("{} Stored API key removed", style("✓").green());
        }
        KeyCommand::Status => {
            let credentials = EnvCredentials::from_config(&config.extraction);
            match credentials.describe() {
                Some(source) => println!("{} API key found ({})", style("✓").green(), source),
                None => {
                    println!("{} No API key configured", style("✗").red());
                    println!();
                    println!(
                        "Set {} or run 'receipt key set <KEY>'.",
                        config.extraction.api_key_env
                    );
                }
            }
        }
    }

    Ok(())
}
