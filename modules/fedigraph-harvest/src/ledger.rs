//! Task ledger: the universe of work units for a run, minus the ones whose
//! checkpoint artifact already exists.
//!
//! Nothing is persisted besides the artifacts themselves. The checkpoint
//! directory is listed once, before the pool starts.

use std::collections::HashSet;
use std::path::Path;

use fedigraph_common::{AuthorsConfig, Result, WorkUnit};
use tracing::{info, warn};

use crate::checkpoint::{artifact_stem, completed_stems};

const TRENDING_PREFIX: &str = "trending_";

/// Target id of one offset range of a host's trending list.
pub fn trending_target_id(host: &str, start_offset: u32) -> String {
    format!("{TRENDING_PREFIX}{host}_{start_offset}")
}

/// Start offset encoded in a trending target id.
pub fn trending_offset(target_id: &str) -> Option<u32> {
    target_id
        .strip_prefix(TRENDING_PREFIX)?
        .rsplit_once('_')?
        .1
        .parse()
        .ok()
}

/// Split every host's trending list into `chunks_per_host` consecutive
/// ranges of `records_per_unit` records. Chunks whose start offset does not
/// fit the API's `u32` offset are skipped.
pub fn enumerate_authors(config: &AuthorsConfig) -> Vec<WorkUnit> {
    let mut units = Vec::new();
    for host in &config.hosts {
        let host = host.trim();
        if host.is_empty() {
            continue;
        }
        for chunk in 0..config.chunks_per_host {
            let Some(start) = chunk
                .checked_mul(config.records_per_unit)
                .and_then(|s| u32::try_from(s).ok())
            else {
                warn!(host, chunk, "Trending offset out of range, remaining chunks skipped");
                break;
            };
            units.push(WorkUnit::new(trending_target_id(host, start), host, host));
        }
    }
    units
}

/// Keep the first unit per artifact name so no two workers share an output path.
pub fn dedup_units(units: Vec<WorkUnit>) -> Vec<WorkUnit> {
    let before = units.len();
    let mut seen = HashSet::new();
    let units: Vec<WorkUnit> = units
        .into_iter()
        .filter(|u| seen.insert(artifact_stem(&u.target_id)))
        .collect();
    if units.len() < before {
        warn!(dropped = before - units.len(), "Dropped duplicate work units");
    }
    units
}

/// Outcome of ledger filtering.
#[derive(Debug, Clone, Default)]
pub struct PendingPlan {
    /// Units enumerated for this run.
    pub considered: usize,
    /// Units skipped because their artifact exists.
    pub completed: usize,
    /// Pending units left out by the batch cap. They stay pending.
    pub deferred: usize,
    /// Units to attempt, in enumeration order.
    pub pending: Vec<WorkUnit>,
}

/// Units whose target has no artifact in `checkpoint_dir`, capped at `batch_size`.
pub fn filter_pending(
    units: Vec<WorkUnit>,
    checkpoint_dir: &Path,
    batch_size: Option<usize>,
) -> Result<PendingPlan> {
    let done = completed_stems(checkpoint_dir)?;
    let considered = units.len();

    let mut pending: Vec<WorkUnit> = units
        .into_iter()
        .filter(|u| !done.contains(&artifact_stem(&u.target_id)))
        .collect();
    let completed = considered - pending.len();

    let mut deferred = 0;
    if let Some(cap) = batch_size {
        if pending.len() > cap {
            deferred = pending.len() - cap;
            pending.truncate(cap);
        }
    }

    info!(
        considered,
        completed,
        pending = pending.len(),
        deferred,
        "Ledger filtered"
    );

    Ok(PendingPlan {
        considered,
        completed,
        deferred,
        pending,
    })
}
