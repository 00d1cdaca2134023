//! Per-unit checkpoint artifacts.
//!
//! One Parquet file per completed work unit, named from its target id. The
//! file is both the unit's result and its completion marker: the ledger treats
//! a unit as done exactly when its artifact exists.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use fedigraph_common::{HarvestRecord, Result, WorkUnit};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::schema::{record_schema_ref, records_to_batch};
use crate::table::write_table;

pub const ARTIFACT_EXTENSION: &str = "parquet";

/// File stem for a target id.
///
/// Ids made only of `[A-Za-z0-9._-]` are used as is. Any other character
/// becomes `_` and the stem gets a `-{hash}` suffix taken from the raw id,
/// so two distinct ids never share an artifact.
pub fn artifact_stem(target_id: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !target_id.is_empty() && target_id.chars().all(safe) {
        return target_id.to_string();
    }
    let sanitized: String = target_id
        .chars()
        .map(|c| if safe(c) { c } else { '_' })
        .collect();
    let digest = Sha256::digest(target_id.as_bytes());
    format!("{sanitized}-{}", hex::encode(&digest[..4]))
}

pub fn artifact_path(dir: &Path, target_id: &str) -> PathBuf {
    dir.join(format!("{}.{ARTIFACT_EXTENSION}", artifact_stem(target_id)))
}

/// Persist a unit's records. Empty results write nothing and return `None`,
/// which leaves the unit pending for the next run.
pub fn commit(dir: &Path, unit: &WorkUnit, records: &[HarvestRecord]) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        return Ok(None);
    }
    let path = artifact_path(dir, &unit.target_id);
    let batch = records_to_batch(records)?;
    write_table(&path, record_schema_ref(), &[batch])?;
    debug!(target_id = unit.target_id.as_str(), path = %path.display(), "Checkpoint written");
    Ok(Some(path))
}

/// Artifact files in `dir`, sorted by file name. A missing directory has none.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Stems of every artifact in `dir`.
pub fn completed_stems(dir: &Path) -> Result<HashSet<String>> {
    Ok(list_artifacts(dir)?
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect())
}
