//! Background worker for the scan cycle.
//!
//! Runs one cycle immediately, then waits a fixed delay after each cycle
//! finishes before starting the next. Cycles never overlap in this model.

use crate::scanner::Scanner;
use ocp_metrics_types::CycleSummary;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of the most recent cycles, shared with the status endpoint
#[derive(Debug, Default)]
pub struct WorkerStatus {
    pub last_tick_at: Option<String>,
    pub last_cycle: Option<CycleSummary>,
    pub last_error: Option<String>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
}

pub type SharedWorkerStatus = Arc<RwLock<WorkerStatus>>;

pub async fn run_worker(scanner: Arc<Scanner>, interval: Duration, status: SharedWorkerStatus) {
    log::info!(
        "[OCP_METRICS] Worker started (scan interval: {}s)",
        interval.as_secs()
    );

    loop {
        tick(&scanner, &status).await;
        tokio::time::sleep(interval).await;
    }
}

/// One scan cycle with its outcome recorded in `status`
pub async fn tick(scanner: &Scanner, status: &SharedWorkerStatus) {
    let result = scanner.run_cycle().await;
    let now = chrono::Utc::now().to_rfc3339();

    let mut status = status.write();
    status.last_tick_at = Some(now);
    match result {
        Ok(summary) => {
            status.cycles_completed += 1;
            status.last_cycle = Some(summary);
            status.last_error = None;
        }
        Err(e) => {
            log::error!("[OCP_METRICS] Tick error: {}", e);
            status.cycles_failed += 1;
            status.last_error = Some(e.to_string());
        }
    }
}
