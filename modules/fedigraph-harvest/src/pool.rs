//! Bounded worker pool over pending work units.
//!
//! Each unit runs on its own tokio task, at most `concurrency` at a time, and
//! is attempted exactly once. Results are observed in completion order. A
//! unit that fails (or panics) is logged and left pending; it never aborts
//! its siblings. The returned future resolves only after every unit settled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fedigraph_common::WorkUnit;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::checkpoint;
use crate::walker::{UnitFailure, WalkOutcome, Walker};

/// How one unit ended.
#[derive(Debug)]
pub enum UnitResult {
    /// Records fetched and checkpointed.
    Committed { path: PathBuf, records: usize },
    /// Listing was empty. No artifact, so the unit is retried next run.
    Empty,
    /// Target does not exist on the host. Also no artifact.
    NotFound,
    /// Transient remote failure.
    RemoteFailure(String),
    /// Unclassified failure, including panics.
    CriticalFailure(String),
    /// Records fetched but the artifact could not be written. Lost work.
    CheckpointFailure { records: usize, error: String },
}

#[derive(Debug)]
pub struct UnitReport {
    pub unit: WorkUnit,
    pub result: UnitResult,
}

/// Run every unit once. `on_settled` sees each report as soon as its unit finishes.
pub async fn run_pool<F>(
    walker: Arc<Walker>,
    units: Vec<WorkUnit>,
    concurrency: usize,
    checkpoint_dir: &Path,
    mut on_settled: F,
) where
    F: FnMut(&UnitReport),
{
    let total = units.len();
    let concurrency = concurrency.max(1);
    info!(units = total, concurrency, "Starting worker pool");

    let mut settled = stream::iter(units.into_iter().map(|unit| {
        let walker = walker.clone();
        let dir = checkpoint_dir.to_path_buf();
        async move {
            let task_unit = unit.clone();
            let handle = tokio::spawn(async move { execute(&walker, &dir, &task_unit).await });
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => UnitResult::CriticalFailure(format!("worker task failed: {e}")),
            };
            UnitReport { unit, result }
        }
    }))
    .buffer_unordered(concurrency);

    let mut done = 0usize;
    while let Some(report) = settled.next().await {
        done += 1;
        log_report(&report, done, total);
        on_settled(&report);
    }
}

/// Walk one unit and checkpoint its records.
async fn execute(walker: &Walker, dir: &Path, unit: &WorkUnit) -> UnitResult {
    let records = match walker.walk(unit).await {
        Ok(WalkOutcome::Records(records)) => records,
        Ok(WalkOutcome::NotFound) => return UnitResult::NotFound,
        Err(UnitFailure::Remote(e)) => return UnitResult::RemoteFailure(e.to_string()),
        Err(UnitFailure::Critical(msg)) => return UnitResult::CriticalFailure(msg),
    };

    let count = records.len();
    match checkpoint::commit(dir, unit, &records) {
        Ok(Some(path)) => UnitResult::Committed {
            path,
            records: count,
        },
        Ok(None) => UnitResult::Empty,
        Err(e) => UnitResult::CheckpointFailure {
            records: count,
            error: e.to_string(),
        },
    }
}

fn log_report(report: &UnitReport, done: usize, total: usize) {
    let target_id = report.unit.target_id.as_str();
    let host = report.unit.host.as_str();
    match &report.result {
        UnitResult::Committed { records, .. } => {
            info!(target_id, host, records, done, total, "Unit committed")
        }
        UnitResult::Empty => info!(target_id, host, done, total, "Unit empty, nothing to checkpoint"),
        UnitResult::NotFound => info!(target_id, host, done, total, "Target not found on host"),
        UnitResult::RemoteFailure(e) => {
            warn!(target_id, host, error = e.as_str(), done, total, "Remote API error, unit left pending")
        }
        UnitResult::CriticalFailure(e) => {
            error!(target_id, host, error = e.as_str(), done, total, "Unit failed, left pending")
        }
        UnitResult::CheckpointFailure { records, error: e } => error!(
            target_id,
            host,
            records,
            error = e.as_str(),
            "Checkpoint write failed, fetched records lost"
        ),
    }
}
