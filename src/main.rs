// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use subfall::app_config::{Config, Tone};
use subfall::app_controller::Controller;
use subfall::progress::{ProgressEvent, ProgressSender};
use subfall::session::{ResolutionState, SessionOutcome};

/// CLI wrapper for Tone to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTone {
    Conversational,
    Formal,
    Literal,
}

impl From<CliTone> for Tone {
    fn from(cli_tone: CliTone) -> Self {
        match cli_tone {
            CliTone::Conversational => Tone::Conversational,
            CliTone::Formal => Tone::Formal,
            CliTone::Literal => Tone::Literal,
        }
    }
}

/// CLI wrapper for log levels
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Translate subtitle files across redundant LLM endpoints with fallback pools
#[derive(Parser, Debug)]
#[command(name = "subfall", version, about)]
struct Cli {
    /// Input SRT file
    input: PathBuf,

    /// Output SRT file (default: <input>.vi.srt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: ~/.subfall/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured chunk size
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Override the configured tone
    #[arg(long, value_enum)]
    tone: Option<CliTone>,

    /// Override the configured fallback retry rounds
    #[arg(long)]
    retry_rounds: Option<usize>,

    /// Resume from a session snapshot written by a previous run
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: CliLogLevel,
}

/// Minimal stderr logger; kept off stdout so the progress bar stays intact
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let _ = writeln!(std::io::stderr(), "[{}] {}", prefix, record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn init_logger(level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(StderrLogger)).context("logger already installed")?;
    log::set_max_level(level);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let mut config = if path.exists() {
        Config::from_file(&path)?
    } else {
        info!("No config file at {}, using defaults", path.display());
        Config::default()
    };
    config.overlay_env_keys();

    if let Some(chunk_size) = cli.chunk_size {
        config.settings.chunk_size = chunk_size;
    }
    if let Some(tone) = cli.tone.clone() {
        config.settings.tone = tone.into();
    }
    if let Some(retry_rounds) = cli.retry_rounds {
        config.settings.retry_rounds = retry_rounds;
    }
    Ok(config)
}

/// Drive the progress bar from the dispatcher's event stream
async fn run_progress_bar(mut rx: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::ChunkFinished {
                start_index,
                end_index,
                state,
                endpoint,
                resolved,
                unresolved,
                in_flight,
            } => {
                let mark = match state {
                    ResolutionState::Resolved => "ok",
                    ResolutionState::Unresolved => "FAILED",
                };
                bar.set_message(format!(
                    "chunk [{}-{}] {} via {} | {} resolved, {} unresolved, {} in flight",
                    start_index,
                    end_index,
                    mark,
                    endpoint.unwrap_or_else(|| "-".to_string()),
                    resolved,
                    unresolved,
                    in_flight
                ));
                bar.inc(1);
            }
            ProgressEvent::SessionFinished {
                outcome,
                resolved,
                unresolved,
            } => {
                bar.finish_with_message(format!(
                    "{:?}: {} resolved, {} unresolved",
                    outcome, resolved, unresolved
                ));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level.clone().into())?;

    let config = load_config(&cli)?;
    let output = cli.output.clone().unwrap_or_else(|| {
        let stem = cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        cli.input.with_file_name(format!("{}.vi.srt", stem))
    });

    let (progress, rx) = ProgressSender::channel();
    let controller = Controller::new(config, progress)?;

    // Ctrl-C requests cancellation; in-flight calls drain, nothing new starts
    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, letting in-flight calls drain");
            cancel.cancel();
        }
    });

    let bar_task = tokio::spawn(run_progress_bar(rx));

    let report = controller
        .translate_file(&cli.input, &output, cli.resume.as_deref())
        .await?;

    // Dropping the controller closes the event channel and ends the bar task
    drop(controller);
    let _ = bar_task.await;

    println!("{}", report.stats.summary());
    match report.outcome {
        SessionOutcome::Completed => info!("Session completed"),
        SessionOutcome::Canceled => warn!("Session canceled; partial results written"),
    }
    Ok(())
}
