//! Background auto-release sweep.
//!
//! Periodically scans for held orders past both the release window and the
//! dispute deadline and releases them with `processed_by = "system"`. Each
//! order is released independently; one failed transfer never blocks the
//! rest of the pass.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use crate::error::EscrowError;
use crate::escrow::EscrowService;

/// Outcome of one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub released: Vec<String>,
    pub failed: Vec<(String, EscrowError)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AutoReleaseSweep {
    escrow: Arc<EscrowService>,
    interval: Duration,
}

impl AutoReleaseSweep {
    pub fn new(escrow: Arc<EscrowService>, interval: Duration) -> Self {
        Self { escrow, interval }
    }

    pub fn run_once(&self) -> Result<SweepReport, EscrowError> {
        self.escrow.auto_release_expired_funds()
    }

    /// Run the sweep on its interval forever. Store-level scan errors are
    /// logged and the loop keeps going; per-order failures are already
    /// handled inside the pass.
    pub fn spawn(self) -> thread::JoinHandle<()> {
        thread::spawn(move || loop {
            match self.run_once() {
                Ok(report) => {
                    if !report.released.is_empty() || !report.failed.is_empty() {
                        info!(
                            released = report.released.len(),
                            failed = report.failed.len(),
                            "auto-release sweep pass finished"
                        );
                    }
                }
                Err(e) => error!(error = %e, "auto-release sweep pass aborted"),
            }
            thread::sleep(self.interval);
        })
    }
}
