use crate::artifacts::Artifact;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Continuous and categorical halves of a cleaned frame.
///
/// Both frames have the same height and row order.
#[derive(Debug, Clone)]
pub struct FamilySplit {
    pub continuous: DataFrame,
    pub categorical: DataFrame,
}

// ============================================================================
// Run Summary Types
// ============================================================================

/// Row counts around one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRows {
    pub step: String,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl StepRows {
    pub fn new(step: impl Into<String>, rows_before: usize, rows_after: usize) -> Self {
        Self {
            step: step.into(),
            rows_before,
            rows_after,
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Human-readable summary of what a dataset run did.
///
/// # Example
///
/// ```rust,ignore
/// let outcome = pipeline.make_dataset(raw)?;
/// println!("Processed {} rows in {}ms", outcome.summary.rows_after, outcome.summary.duration_ms);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Number of rows in the raw input.
    pub rows_before: usize,
    /// Number of rows in the gold dataset.
    pub rows_after: usize,

    /// Number of columns in the raw input.
    pub columns_before: usize,
    /// Number of columns in the gold dataset.
    pub columns_after: usize,

    /// Row counts around each filtering step.
    pub steps: Vec<StepRows>,

    /// Artifacts written, in write order.
    pub artifacts_written: Vec<Artifact>,

    /// Free-text log of the actions taken.
    pub actions: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: impl Into<String>, rows_before: usize, rows_after: usize) {
        self.steps.push(StepRows::new(step, rows_before, rows_after));
    }

    pub fn record_artifact(&mut self, artifact: Artifact) {
        self.artifacts_written.push(artifact);
    }

    /// Rows removed across all steps.
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Result of the dataset stage: the gold frame and what produced it.
#[derive(Debug, Clone)]
pub struct DatasetOutcome {
    pub gold: DataFrame,
    pub summary: RunSummary,
}
