//! Scan command - extract the text of a single receipt image.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use receipt_core::encoder::has_image_extension;
use receipt_core::{
    EnvCredentials, ExtractionClient, FailureKind, FileHistory, GeminiBackend, HistoryStore,
    ImageFile, MemoryHistory, ReceiptConfig, ScanRecord, ScanSession, SessionEvent,
    SessionOptions, SessionState,
};

use super::{config_path, copy_to_clipboard, history_path, load_config};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Receipt image (png, jpg, webp, heic, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Copy the extracted text to the clipboard
    #[arg(long)]
    copy: bool,

    /// Print the saved scan record as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ScanArgs, config_override: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(&config_path(config_override))?;
    let locale = config.ui.locale;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !has_image_extension(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    let image = ImageFile::read(&args.input).await?;
    info!("Scanning file: {} ({})", args.input.display(), image.mime_type());

    let history = open_history(&config);
    let client = ExtractionClient::new(
        build_backend(&config)?,
        EnvCredentials::from_config(&config.extraction),
    );
    let options = SessionOptions::from_config(&config);
    let reselect_delay = options.reselect_delay;
    let (session, mut events) = ScanSession::new(client, history, options);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(locale.analyzing());
    pb.enable_steady_tick(Duration::from_millis(100));

    let state = session.scan(image).await?;
    pb.finish_and_clear();

    match state {
        SessionState::Result { text, .. } => {
            let record = drain_completed(&mut events);

            if args.json {
                match &record {
                    Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
                    None => println!("{}", serde_json::to_string_pretty(&text)?),
                }
            } else {
                println!("{}", text);
            }

            if args.copy {
                copy_to_clipboard(&text)?;
                eprintln!("{} {}", style("✓").green(), locale.copied());
            }
        }
        SessionState::Failed { kind, message, .. } => {
            match kind {
                FailureKind::Unconfigured => {
                    eprintln!(
                        "{} Set the {} environment variable or run 'receipt key set <KEY>'.",
                        style("ℹ").blue(),
                        config.extraction.api_key_env
                    );
                }
                FailureKind::Unauthorized => {
                    if wait_for_reselect(&mut events, reselect_delay).await {
                        eprintln!(
                            "{} Run 'receipt key set <KEY>' to select a new API key.",
                            style("ℹ").blue()
                        );
                    }
                }
                FailureKind::EmptyResult | FailureKind::Generic => {}
            }
            anyhow::bail!("{}", message);
        }
        SessionState::Idle | SessionState::Loading { .. } => {
            anyhow::bail!("Scan ended in unexpected state");
        }
    }

    debug!("Total scan time: {:?}", start.elapsed());

    Ok(())
}

fn build_backend(config: &ReceiptConfig) -> anyhow::Result<GeminiBackend> {
    let backend = match config.extraction.timeout_secs {
        Some(secs) => GeminiBackend::with_timeout(Duration::from_secs(secs))?,
        None => GeminiBackend::new(),
    };
    Ok(backend.with_base_url(config.extraction.base_url.as_str()))
}

/// Open the history file, or an unsaved in-memory history if it is unreadable.
///
/// An unreadable file is left untouched so it can be repaired by hand.
fn open_history(config: &ReceiptConfig) -> Box<dyn HistoryStore> {
    let path = history_path(config);
    match FileHistory::open_path(&path) {
        Ok(history) => Box::new(history),
        Err(e) => {
            warn!("Cannot read history file {}: {}", path.display(), e);
            eprintln!(
                "{} Cannot read history file {} ({}); this scan will not be saved.",
                style("⚠").yellow(),
                path.display(),
                e
            );
            Box::new(MemoryHistory::empty())
        }
    }
}

/// Collect the saved record, reporting a failed history write.
fn drain_completed(events: &mut UnboundedReceiver<SessionEvent>) -> Option<ScanRecord> {
    let mut record = None;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ScanCompleted(saved) => record = Some(saved),
            SessionEvent::HistoryNotSaved { message } => {
                eprintln!(
                    "{} Scan was not saved to history: {}",
                    style("⚠").yellow(),
                    message
                );
            }
            SessionEvent::CredentialReselectRequested => {}
        }
    }
    record
}

/// Wait for the deferred reselect signal of a rejected credential.
async fn wait_for_reselect(
    events: &mut UnboundedReceiver<SessionEvent>,
    delay: Duration,
) -> bool {
    let wait = async {
        while let Some(event) = events.recv().await {
            if event == SessionEvent::CredentialReselectRequested {
                return true;
            }
        }
        false
    };

    tokio::time::timeout(delay + Duration::from_secs(1), wait)
        .await
        .unwrap_or(false)
}
