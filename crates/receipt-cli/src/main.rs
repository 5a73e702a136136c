//! CLI application for scanning receipts to text.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, history, key, scan};

/// Receipt scanner - extract the text of a receipt photo with a vision model
#[derive(Parser)]
#[command(name = "receipt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a receipt image
    Scan(scan::ScanArgs),

    /// Browse previous scans
    History(history::HistoryArgs),

    /// Manage the stored API key
    Key(key::KeyArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Scan(args) => scan::run(args, config_path).await,
        Commands::History(args) => history::run(args, config_path).await,
        Commands::Key(args) => key::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
