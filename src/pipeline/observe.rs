// src/pipeline/observe.rs

//! Observation loop.
//!
//! One cycle is fetch → decode → fingerprint → (on change) notify + checkpoint.
//! Cycles run one at a time; failures are absorbed at the cycle boundary and
//! counted, and the loop only ends when the shutdown signal fires.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::{Config, MonitorConfig};
use crate::pipeline::{Fingerprint, fingerprint};
use crate::services::{Delivery, GridDecoder, GridSource, Notifier, WebhookNotifier, source};
use crate::storage::{Checkpoint, CheckpointStore, LocalCheckpointStore};

/// Mutable monitoring state, written only by the observer's own cycle.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    /// Fingerprint of the last collection seen (or restored from a checkpoint)
    pub last_fingerprint: Option<Fingerprint>,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Content differs from the last known fingerprint (or none was known)
    Changed {
        rooms: usize,
        fingerprint: Fingerprint,
        delivery: Delivery,
        checkpoint_saved: bool,
    },
    /// Content matches the last known fingerprint
    Unchanged { rooms: usize },
    /// The cycle raised before completing
    Failed {
        error: String,
        consecutive_failures: u32,
        critical: bool,
    },
}

impl CycleReport {
    /// Turn a failed cycle into an error, keep any other report.
    pub fn into_result(self) -> Result<Self> {
        match self {
            CycleReport::Failed { error, .. } => Err(AppError::Cycle(error)),
            report => Ok(report),
        }
    }
}

/// Drives the observation cycle.
pub struct Observer {
    source: Box<dyn GridSource>,
    decoder: GridDecoder,
    notifier: Box<dyn Notifier>,
    checkpoints: Box<dyn CheckpointStore>,
    settings: MonitorConfig,
    state: MonitorState,
}

impl Observer {
    pub fn new(
        source: Box<dyn GridSource>,
        notifier: Box<dyn Notifier>,
        checkpoints: Box<dyn CheckpointStore>,
        settings: MonitorConfig,
    ) -> Self {
        Self {
            source,
            decoder: GridDecoder::new(),
            notifier,
            checkpoints,
            settings,
            state: MonitorState::default(),
        }
    }

    /// Wire up the configured source, webhook, and checkpoint file.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            source::from_config(&config.source)?,
            Box::new(WebhookNotifier::from_config(&config.notifier)?),
            Box::new(LocalCheckpointStore::from_config(&config.checkpoint)),
            config.monitor.clone(),
        ))
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Seed the last known fingerprint from a fresh checkpoint, if any.
    pub async fn restore(&mut self) -> bool {
        match self.checkpoints.load_fingerprint().await {
            Some(hash) => {
                log::info!("Resuming from checkpoint fingerprint {}", hash);
                self.state.last_fingerprint = Some(hash);
                true
            }
            None => false,
        }
    }

    /// Run one cycle and absorb its failure, if any.
    pub async fn tick(&mut self) -> CycleReport {
        match self.run_cycle().await {
            Ok(report) => {
                self.state.consecutive_failures = 0;
                self.state.last_success = Some(Utc::now());
                report
            }
            Err(e) => {
                self.state.consecutive_failures += 1;
                let failures = self.state.consecutive_failures;
                log::error!("Observation cycle failed (attempt {}): {}", failures, e);

                let critical = failures >= self.settings.max_consecutive_failures;
                if critical {
                    log::error!(
                        "CRITICAL: {} consecutive failed cycles, the observer may have a serious problem",
                        failures
                    );
                }
                CycleReport::Failed {
                    error: e.to_string(),
                    consecutive_failures: failures,
                    critical,
                }
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<CycleReport> {
        let grid = self.source.fetch_grid().await?;
        if grid.is_empty() {
            log::warn!("{} returned an empty grid", self.source.describe());
        }

        let rooms = self.decoder.decode(&grid);
        let current = fingerprint(&rooms)?;
        log::debug!("Current fingerprint: {}", current);

        match &self.state.last_fingerprint {
            Some(previous) if *previous == current => {
                log::debug!("No changes detected");
                return Ok(CycleReport::Unchanged { rooms: rooms.len() });
            }
            Some(previous) => log::info!("Changes detected ({} -> {})", previous, current),
            None => log::info!("First check, treating {} rooms as changed", rooms.len()),
        }
        self.state.last_fingerprint = Some(current.clone());

        let delivery = self.notifier.notify(&rooms).await;

        let room_count = rooms.len();
        let checkpoint = Checkpoint::new(current.clone(), rooms);
        let checkpoint_saved = match self.checkpoints.save(&checkpoint).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to save checkpoint: {}", e);
                false
            }
        };

        Ok(CycleReport::Changed {
            rooms: room_count,
            fingerprint: current,
            delivery,
            checkpoint_saved,
        })
    }

    /// Run cycles until `shutdown` carries `true` (or its sender is dropped).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Watching {} every {:?}",
            self.source.describe(),
            self.settings.check_interval()
        );
        self.restore().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = AssertUnwindSafe(self.tick()).catch_unwind() => outcome,
                _ = stopped(&mut shutdown) => break,
            };

            let pause = match outcome {
                Ok(_) => self.settings.check_interval(),
                Err(panic) => {
                    log::error!("Unexpected error in observation loop: {}", panic_message(&*panic));
                    self.settings.retry_delay()
                }
            };

            if !sleep_unless_stopped(pause, &mut shutdown).await {
                break;
            }
        }

        log::info!("Observation stopped");
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Sleep for `pause`; returns false when interrupted by shutdown.
async fn sleep_unless_stopped(pause: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(pause) => true,
        _ = stopped(shutdown) => false,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
