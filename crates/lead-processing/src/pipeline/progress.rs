//! Progress reporting and cancellation for pipeline runs.
//!
//! A caller may pass a [`ProgressReporter`] to observe stage transitions and a
//! [`CancellationToken`] to stop a run between stages from another thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use lead_processing::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let pipeline = Pipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of the lead preparation pipeline.
///
/// The dataset run walks the stages from `Initializing` to `Persisting`;
/// feature construction is a run of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Pipeline is initializing
    Initializing,
    /// Filtering records to the date range
    DateFiltering,
    /// Dropping excluded columns
    ColumnSelection,
    /// Removing invalid rows
    RowCleaning,
    /// Casting categorical columns and splitting families
    TypeFixing,
    /// Clipping continuous outliers
    OutlierHandling,
    /// Imputing missing values
    Imputation,
    /// Fitting and applying the scaler
    Scaling,
    /// Writing the schema snapshot and gold dataset
    Persisting,
    /// Building the feature table
    FeatureConstruction,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline was cancelled
    Cancelled,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::DateFiltering => "Filtering Dates",
            Self::ColumnSelection => "Selecting Columns",
            Self::RowCleaning => "Cleaning Rows",
            Self::TypeFixing => "Fixing Types",
            Self::OutlierHandling => "Handling Outliers",
            Self::Imputation => "Imputing Values",
            Self::Scaling => "Scaling",
            Self::Persisting => "Persisting Artifacts",
            Self::FeatureConstruction => "Building Features",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Returns the typical weight of this stage in its run (0.0 - 1.0).
    ///
    /// Dataset stages sum to ~1.0; feature construction is a run on its own.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::DateFiltering => 0.10,
            Self::ColumnSelection => 0.05,
            Self::RowCleaning => 0.10,
            Self::TypeFixing => 0.08,
            Self::OutlierHandling => 0.15,
            Self::Imputation => 0.20,
            Self::Scaling => 0.10,
            Self::Persisting => 0.20,
            Self::FeatureConstruction => 1.0,
            Self::Complete => 0.0,
            Self::Cancelled => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::DateFiltering => 0.02,
            Self::ColumnSelection => 0.12,
            Self::RowCleaning => 0.17,
            Self::TypeFixing => 0.27,
            Self::OutlierHandling => 0.35,
            Self::Imputation => 0.50,
            Self::Scaling => 0.70,
            Self::Persisting => 0.80,
            Self::FeatureConstruction => 0.0,
            Self::Complete => 1.0,
            Self::Cancelled => 0.0,
            Self::Failed => 0.0,
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Overall progress of the run (0.0 - 1.0).
    pub progress: f32,

    /// Progress within the stage (0.0 - 1.0).
    pub stage_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    fn at(stage: PipelineStage, stage_progress: f32, message: String) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + stage.weight() * stage_progress;
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message,
        }
    }

    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        Self::at(stage, stage_progress, message.into())
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::at(PipelineStage::Complete, 1.0, message.into())
    }

    pub fn cancelled() -> Self {
        Self::at(PipelineStage::Cancelled, 0.0, "Pipeline cancelled".to_string())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::at(PipelineStage::Failed, 0.0, message.into())
    }
}

/// Receiver of progress updates.
///
/// Implementations must be cheap and non-blocking; the pipeline calls them
/// synchronously between steps.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for cancelling a run.
///
/// Clones share state, so a clone handed to another thread can cancel the
/// run. The pipeline checks the flag between stages and returns
/// [`PipelineError::Cancelled`](crate::error::PipelineError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

}
