//! Pipeline module.
//!
//! This module provides the lead preparation pipeline and related components.

mod builder;
mod executor;
pub mod outliers;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::TransformExecutor;
pub use outliers::OutlierHandler;
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
