use std::fmt;

use serde::Serialize;

use super::{RowOutcome, SkipReason};

/// Row counts of a reconciliation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    /// Misclassified places replaced by a sub-place
    pub demoted: u64,
    /// Unpopulated records replaced by a point of interest
    pub deleted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub ambiguous: u64,
    /// Populated records kept although the row says they are points of interest
    pub conflicts: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Skipped(SkipReason::Comment) => return,
            RowOutcome::Created { .. } => self.created += 1,
            RowOutcome::Updated { .. } => self.updated += 1,
            RowOutcome::DemotedAndRecreated { .. } => self.demoted += 1,
            RowOutcome::DeletedSuperseded { .. } => self.deleted += 1,
            RowOutcome::Skipped(SkipReason::Conflict { .. }) => self.conflicts += 1,
            RowOutcome::Skipped(SkipReason::Failed(_)) => self.failed += 1,
            RowOutcome::Skipped(SkipReason::Invalid(_)) => self.skipped += 1,
        }
        self.processed += 1;
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.demoted += other.demoted;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.ambiguous += other.ambiguous;
        self.conflicts += other.conflicts;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} created, {} updated, {} demoted, {} deleted, {} skipped, {} failed, {} ambiguous, {} conflicts",
            self.processed,
            self.created,
            self.updated,
            self.demoted,
            self.deleted,
            self.skipped,
            self.failed,
            self.ambiguous,
            self.conflicts
        )
    }
}
