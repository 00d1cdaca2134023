//! Merge stage: concatenate every checkpoint artifact into one dataset.
//!
//! Pure read of the checkpoint directory. Artifacts are read in file-name
//! order, so the same directory always produces the same output bytes.

use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;
use fedigraph_common::{ListingKind, Result};
use tracing::info;

use crate::checkpoint::list_artifacts;
use crate::schema::{check_record_schema, record_schema_ref};
use crate::table::{read_parquet, write_table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub artifacts: usize,
    pub records: usize,
    pub path: PathBuf,
}

/// Merge `checkpoint_dir` into `output` (`.csv` or `.parquet`).
/// Returns `None` without writing anything when there are no artifacts.
pub fn merge(checkpoint_dir: &Path, output: &Path) -> Result<Option<MergeOutcome>> {
    let artifacts = list_artifacts(checkpoint_dir)?;
    if artifacts.is_empty() {
        info!(dir = %checkpoint_dir.display(), "Nothing to merge");
        return Ok(None);
    }

    let schema = record_schema_ref();
    let mut batches = Vec::new();
    for path in &artifacts {
        let (file_schema, file_batches) = read_parquet(path)?;
        check_record_schema(&file_schema, &path.display().to_string())?;
        batches.extend(file_batches);
    }

    let merged = concat_batches(&schema, &batches)?;
    let records = merged.num_rows();
    write_table(output, schema, &[merged])?;

    info!(
        artifacts = artifacts.len(),
        records,
        output = %output.display(),
        "Merged checkpoint artifacts"
    );
    Ok(Some(MergeOutcome {
        artifacts: artifacts.len(),
        records,
        path: output.to_path_buf(),
    }))
}

/// `{output_dir}/{kind}_{ddmmYYYY_HHMMSS}.csv`
pub fn default_output_path(output_dir: &Path, kind: ListingKind) -> PathBuf {
    let now = chrono::Local::now();
    output_dir.join(format!("{}_{}.csv", kind, now.format("%d%m%Y_%H%M%S")))
}
