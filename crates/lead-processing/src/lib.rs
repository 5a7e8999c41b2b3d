//! Lead Dataset Preparation Library
//!
//! Reproducible preparation of a lead-generation export for model training,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! A training run goes through two entry points on [`Pipeline`]:
//!
//! - **Dataset stage** ([`Pipeline::make_dataset`]): date-range filtering,
//!   column selection, row cleaning, type fixing, 2-sigma outlier clipping,
//!   per-family imputation and min-max scaling. Produces the gold dataset.
//! - **Feature stage** ([`Pipeline::build_features`]): drops identifiers,
//!   expands categorical columns into drop-first indicators and coerces
//!   everything to `Float64`.
//!
//! Every fitted value (date limits, imputation values, scaler ranges, the
//! column snapshot, the feature list) is written once through an
//! [`ArtifactStore`]. [`InferencePreparer`] reads them back to prepare new
//! records exactly like the training data, and [`registry::promote_model`]
//! waits for a trained model to reach its deployment stage.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lead_processing::{Pipeline, PipelineConfig};
//! use chrono::NaiveDate;
//!
//! let raw = lead_processing::io::read_csv("raw_data.csv")?;
//!
//! let config = PipelineConfig::builder()
//!     .max_date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
//!     .artifact_dir("artifacts")
//!     .build()?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let outcome = pipeline.make_dataset(raw)?;
//! let features = pipeline.build_features(outcome.gold)?;
//! ```
//!
//! # Inference
//!
//! ```rust,ignore
//! use lead_processing::{ArtifactBundle, FsArtifactStore, InferencePreparer, LeadSchema};
//!
//! let bundle = ArtifactBundle::load(&FsArtifactStore::new("artifacts")?)?;
//! let batch = InferencePreparer::new(bundle, LeadSchema::default(), Default::default())
//!     .prepare(lead_processing::io::read_csv("X_test.csv")?)?;
//! let labels = lead_processing::io::read_optional_csv("y_test.csv")?;
//! ```

pub mod artifacts;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod inference;
pub mod io;
pub mod pipeline;
pub mod registry;
pub mod scaling;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use artifacts::{
    Artifact, ArtifactStore, ArtifactStoreExt, DateLimits, FsArtifactStore, MemoryArtifactStore,
};
pub use cleaner::DataCleaner;
pub use config::{
    ConfigValidationError, NumericImputation, PipelineConfig, PipelineConfigBuilder,
    UnmappedSourcePolicy,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use features::{FeatureBuilder, FeatureColumns, FeatureFrame};
pub use imputers::{ImputationValues, StatisticalImputer};
pub use inference::{ArtifactBundle, InferencePreparer, PreparedBatch, check_schema_drift};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage,
    ProgressReporter, ProgressUpdate, TransformExecutor,
};
pub use registry::{
    Clock, DeploymentStatus, ModelRegistry, PromotionRequest, SystemClock, WaitPolicy,
    promote_model,
};
pub use scaling::MinMaxScaler;
pub use schema::{ColumnRole, ColumnSpec, LeadSchema};
pub use types::{DatasetOutcome, FamilySplit, RunSummary, StepRows};
