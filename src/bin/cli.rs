//! Classroom Observer CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use classroom_observer::{
    error::{AppError, Result},
    models::Config,
    pipeline::{CycleReport, Observer},
    services::{Delivery, FileSource, GridDecoder},
    storage::{CheckpointStore, LocalCheckpointStore},
};
use tokio::sync::watch;

/// Classroom Observer - watches a classroom sheet and pushes schedule changes
#[derive(Parser, Debug)]
#[command(
    name = "classroom-observer",
    version,
    about = "Classroom schedule sheet observer"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the sheet until interrupted (default)
    Watch,

    /// Run a single observation cycle
    Once,

    /// Decode a local grid file and print the rooms as JSON
    Decode {
        /// JSON file holding an array of rows
        #[arg(long)]
        grid: PathBuf,
    },

    /// Validate configuration
    Validate,

    /// Show checkpoint status
    Info,

    /// Write a configuration template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging from the configured level, or debug when verbose.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// File settings (when present) overlaid with the environment.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env()?;
    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Main entry point for the CLI application.
///
/// Exits with 2 on configuration errors and 1 on any other failure.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli.config);

    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Result<Config>) -> Result<()> {
    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let config = config?;
            config.validate()?;
            log::info!("Classroom observer starting...");

            let mut observer = Observer::from_config(&config)?;
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                log::info!("Shutdown requested");
                let _ = tx.send(true);
            });

            observer.run(rx).await;
        }

        Command::Once => {
            let config = config?;
            config.validate()?;

            let mut observer = Observer::from_config(&config)?;
            observer.restore().await;
            let report = observer.tick().await;
            match report.clone() {
                CycleReport::Changed {
                    rooms,
                    fingerprint,
                    delivery,
                    checkpoint_saved,
                } => {
                    println!("changed: {rooms} rooms, fingerprint {fingerprint}");
                    match delivery {
                        Delivery::Delivered => println!("delivery: ok"),
                        Delivery::Rejected { status, .. } => println!("delivery: rejected ({status})"),
                        Delivery::Failed { message } => println!("delivery: failed ({message})"),
                    }
                    println!("checkpoint: {}", if checkpoint_saved { "saved" } else { "not saved" });
                }
                CycleReport::Unchanged { rooms } => println!("unchanged: {rooms} rooms"),
                CycleReport::Failed { error, .. } => println!("failed: {error}"),
            }
            report.into_result()?;
        }

        Command::Decode { grid } => {
            let grid = FileSource::read(&grid)?;
            let report = GridDecoder::new().decode_report(&grid);
            log::info!(
                "Decoded {} rooms from {} rows ({} skipped)",
                report.rooms.len(),
                report.rows_scanned,
                report.rows_skipped
            );
            println!("{}", serde_json::to_string_pretty(&report.rooms)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = config?;

            config.validate()?;
            log::info!("✓ Config OK");
            log::info!("Update endpoint: {}", config.notifier.endpoint()?);
        }

        Command::Info => {
            let config = config?;
            let store = LocalCheckpointStore::from_config(&config.checkpoint);
            log::info!("Checkpoint file: {}", store.path().display());

            match store.load().await {
                Some(checkpoint) => {
                    log::info!("Written: {}", checkpoint.timestamp);
                    log::info!("Fingerprint: {}", checkpoint.data_hash);
                    log::info!("Rooms: {}", checkpoint.classrooms.len());
                }
                None => log::info!("No fresh checkpoint found."),
            }
        }

        Command::Init { force } => {
            if cli.config.exists() && !force {
                return Err(AppError::config(format!(
                    "{} already exists. Use --force to overwrite.",
                    cli.config.display()
                )));
            }
            std::fs::write(&cli.config, Config::template()?)?;
            log::info!("Configuration template written to {}", cli.config.display());
        }
    }

    Ok(())
}
