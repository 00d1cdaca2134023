//! Upstream task source: work units read from a previously harvested table.

use std::path::Path;

use fedigraph_common::{HarvestError, RebloggersConfig, Result, WorkUnit};
use tracing::{info, warn};

use crate::table::{non_empty, read_table, string_column};

/// Read one work unit per row of `config.source`.
///
/// Rows with an empty target or host are skipped. Missing columns or an
/// unreadable file are errors.
pub fn read_units(config: &RebloggersConfig) -> Result<Vec<WorkUnit>> {
    read_units_from(
        &config.source,
        &config.target_column,
        &config.parent_column,
        &config.host_column,
    )
}

pub fn read_units_from(
    path: &Path,
    target_column: &str,
    parent_column: &str,
    host_column: &str,
) -> Result<Vec<WorkUnit>> {
    if !path.is_file() {
        return Err(HarvestError::Source(format!(
            "task source not found: {}",
            path.display()
        )));
    }
    let (_, batches) = read_table(path)?;

    let mut units = Vec::new();
    let mut skipped = 0usize;
    for batch in &batches {
        let targets = string_column(batch, target_column)?;
        let parents = string_column(batch, parent_column)?;
        let hosts = string_column(batch, host_column)?;

        for row in 0..batch.num_rows() {
            match (non_empty(&targets, row), non_empty(&hosts, row)) {
                (Some(target), Some(host)) => {
                    let parent = non_empty(&parents, row).unwrap_or_default();
                    units.push(WorkUnit::new(target, parent, host));
                }
                _ => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, source = %path.display(), "Skipped rows without target or host");
    }
    info!(units = units.len(), source = %path.display(), "Task source loaded");
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn units_are_read_in_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.csv");
        fs::write(
            &path,
            "id,username,handle,server,parent_id,host\n\
             565921,alice,alice,mastodon.social,115310498566920494,mastodon.social\n\
             77,bob,bob@mas.to,mas.to,115310498566999999,c.im\n",
        )
        .unwrap();

        let units = read_units(&RebloggersConfig {
            source: path,
            ..RebloggersConfig::default()
        })
        .unwrap();

        assert_eq!(
            units,
            vec![
                WorkUnit::new("115310498566920494", "565921", "mastodon.social"),
                WorkUnit::new("115310498566999999", "77", "c.im"),
            ]
        );
    }

    #[test]
    fn rows_without_target_or_host_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.csv");
        fs::write(&path, "target,parent,host\nT1,P1,H1\n,P2,H1\nT3,P3,\nT4,,H2\n").unwrap();

        let units = read_units_from(&path, "target", "parent", "host").unwrap();
        assert_eq!(
            units,
            vec![WorkUnit::new("T1", "P1", "H1"), WorkUnit::new("T4", "", "H2")]
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.csv");
        fs::write(&path, "target,host\nT1,H1\n").unwrap();
        assert!(read_units_from(&path, "target", "parent", "host").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_units_from(&dir.path().join("none.csv"), "t", "p", "h").unwrap_err();
        assert!(err.to_string().contains("task source not found"));
    }
}
