use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fedigraph_common::{FileConfig, ListingKind, WorkUnit};
use tracing::{error, info, info_span, Instrument};

use crate::ledger::{self, PendingPlan};
use crate::merge::{self, MergeOutcome};
use crate::pool::run_pool;
use crate::report::RunReport;
use crate::source;
use crate::traits::ListingApi;
use crate::walker::Walker;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Merge the checkpoint directory once the pool drains.
    pub merge: bool,
    /// Merged output path. Defaults to a timestamped CSV in `harvest.output_dir`.
    pub output: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            merge: true,
            output: None,
        }
    }
}

/// Ledger → worker pool → checkpoints → merge, for one listing kind.
pub struct Harvester {
    config: FileConfig,
    api: Arc<dyn ListingApi>,
}

impl Harvester {
    pub fn new(config: FileConfig, api: Arc<dyn ListingApi>) -> Self {
        Self { config, api }
    }

    pub fn checkpoint_dir(&self, kind: ListingKind) -> PathBuf {
        self.config.harvest.checkpoint_dir_for(kind)
    }

    /// Every work unit of `kind`, in enumeration order, one per artifact name.
    pub fn enumerate(&self, kind: ListingKind) -> Result<Vec<WorkUnit>> {
        let units = match kind {
            ListingKind::Authors => ledger::enumerate_authors(&self.config.authors),
            ListingKind::Rebloggers => source::read_units(&self.config.rebloggers)
                .with_context(|| {
                    format!(
                        "Failed to read task source {}",
                        self.config.rebloggers.source.display()
                    )
                })?,
        };
        Ok(ledger::dedup_units(units))
    }

    /// Units the next run would attempt. Reads only; creates nothing.
    pub fn plan(&self, kind: ListingKind) -> Result<PendingPlan> {
        self.config.validate(kind)?;
        let units = self.enumerate(kind)?;
        let plan = ledger::filter_pending(units, &self.checkpoint_dir(kind), self.config.harvest.batch_size)
            .context("Failed to list checkpoint directory")?;
        Ok(plan)
    }

    /// One harvest pass. Unit failures are counted, never returned.
    pub async fn run(&self, kind: ListingKind, options: &RunOptions) -> Result<RunReport> {
        self.config.validate(kind)?;
        let harvest = &self.config.harvest;

        let units = self.enumerate(kind)?;
        let dir = self.checkpoint_dir(kind);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create checkpoint directory {}", dir.display()))?;

        let plan = ledger::filter_pending(units, &dir, harvest.batch_size)
            .context("Failed to list checkpoint directory")?;
        let mut report = RunReport::new(kind, &plan);

        let max_records = match kind {
            ListingKind::Authors => Some(self.config.authors.records_per_unit),
            ListingKind::Rebloggers => harvest.max_records_per_unit,
        };
        let walker = Arc::new(Walker::new(
            self.api.clone(),
            kind,
            harvest.page_delay(),
            max_records,
        ));

        let span = info_span!("harvest", run_id = %report.run_id, kind = %kind);
        run_pool(walker, plan.pending, harvest.concurrency, &dir, |unit| {
            report.record(unit)
        })
        .instrument(span)
        .await;

        if options.merge {
            let output = options
                .output
                .clone()
                .unwrap_or_else(|| merge::default_output_path(&harvest.output_dir, kind));
            match merge::merge(&dir, &output) {
                Ok(Some(outcome)) => report.merged_records = Some(outcome.records),
                Ok(None) => report.merged_records = Some(0),
                Err(e) => error!(error = %e, output = %output.display(), "Merge failed, checkpoints kept"),
            }
        }

        info!("{report}");
        Ok(report)
    }

    /// Merge the checkpoint directory of `kind` without harvesting.
    pub fn merge(&self, kind: ListingKind, output: Option<&Path>) -> Result<Option<MergeOutcome>> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| merge::default_output_path(&self.config.harvest.output_dir, kind));
        let dir = self.checkpoint_dir(kind);
        merge::merge(&dir, &output)
            .with_context(|| format!("Failed to merge {} into {}", dir.display(), output.display()))
    }
}
