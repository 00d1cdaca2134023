use std::fmt;

use fedigraph_common::ListingKind;
use uuid::Uuid;

use crate::ledger::PendingPlan;
use crate::pool::{UnitReport, UnitResult};

/// Counts from one harvest run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub kind: ListingKind,
    pub considered: usize,
    pub already_done: usize,
    pub pending: usize,
    pub deferred: usize,
    pub attempted: usize,
    pub committed: usize,
    pub empty: usize,
    pub not_found: usize,
    pub remote_failures: usize,
    pub critical_failures: usize,
    pub checkpoint_failures: usize,
    pub records_written: usize,
    pub records_lost: usize,
    pub merged_records: Option<usize>,
}

impl RunReport {
    pub fn new(kind: ListingKind, plan: &PendingPlan) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            considered: plan.considered,
            already_done: plan.completed,
            pending: plan.pending.len(),
            deferred: plan.deferred,
            attempted: 0,
            committed: 0,
            empty: 0,
            not_found: 0,
            remote_failures: 0,
            critical_failures: 0,
            checkpoint_failures: 0,
            records_written: 0,
            records_lost: 0,
            merged_records: None,
        }
    }

    pub fn record(&mut self, report: &UnitReport) {
        self.attempted += 1;
        match &report.result {
            UnitResult::Committed { records, .. } => {
                self.committed += 1;
                self.records_written += records;
            }
            UnitResult::Empty => self.empty += 1,
            UnitResult::NotFound => self.not_found += 1,
            UnitResult::RemoteFailure(_) => self.remote_failures += 1,
            UnitResult::CriticalFailure(_) => self.critical_failures += 1,
            UnitResult::CheckpointFailure { records, .. } => {
                self.checkpoint_failures += 1;
                self.records_lost += records;
            }
        }
    }

    /// Units that ended without an artifact and will be attempted again.
    pub fn still_pending(&self) -> usize {
        self.attempted - self.committed + self.deferred
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Harvest Run Complete ({}) ===", self.kind)?;
        writeln!(f, "Run id:              {}", self.run_id)?;
        writeln!(f, "Units considered:    {}", self.considered)?;
        writeln!(f, "Already done:        {}", self.already_done)?;
        writeln!(f, "Pending:             {}", self.pending)?;
        writeln!(f, "Deferred (batch cap): {}", self.deferred)?;
        writeln!(f, "Attempted:           {}", self.attempted)?;
        writeln!(f, "\nOutcomes:")?;
        writeln!(f, "  Committed:         {}", self.committed)?;
        writeln!(f, "  Empty:             {}", self.empty)?;
        writeln!(f, "  Not found:         {}", self.not_found)?;
        writeln!(f, "  Remote errors:     {}", self.remote_failures)?;
        writeln!(f, "  Critical errors:   {}", self.critical_failures)?;
        writeln!(f, "  Checkpoint errors: {}", self.checkpoint_failures)?;
        writeln!(f, "\nRecords written:     {}", self.records_written)?;
        if self.records_lost > 0 {
            writeln!(f, "Records lost:        {}", self.records_lost)?;
        }
        match self.merged_records {
            Some(n) => writeln!(f, "Merged records:      {n}")?,
            None => writeln!(f, "Merged records:      -")?,
        }
        writeln!(f, "Still pending:       {}", self.still_pending())
    }
}
