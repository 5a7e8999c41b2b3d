//! Configuration types for the lead preparation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Strategy for imputing missing continuous values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NumericImputation {
    /// Use the mean of non-null values
    #[default]
    Mean,
    /// Use the median of non-null values
    Median,
}

/// What `bin_source` holds for a source value outside the known mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnmappedSourcePolicy {
    /// Leave the group missing
    #[default]
    Missing,
    /// Put the row into an explicit "Others" group
    Others,
}

/// Configuration for the lead preparation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lead_processing::config::{PipelineConfig, NumericImputation};
///
/// let config = PipelineConfig::builder()
///     .min_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
///     .numeric_imputation(NumericImputation::Mean)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Earliest record date kept by the date filter (inclusive).
    /// Default: 2024-01-01
    pub min_date: NaiveDate,

    /// Latest record date kept by the date filter (inclusive).
    /// If None, today's date is used when the filter runs.
    /// Default: None
    pub max_date: Option<NaiveDate>,

    /// Strategy for imputing missing continuous values.
    /// Default: Mean
    pub numeric_imputation: NumericImputation,

    /// Group assigned to sources outside the known mapping.
    /// Default: Missing
    pub unmapped_source_policy: UnmappedSourcePolicy,

    /// Directory the filesystem artifact store writes to.
    /// Default: "artifacts"
    pub artifact_dir: PathBuf,
}

/// Default lower bound of the date filter.
pub fn default_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_date: default_min_date(),
            max_date: None,
            numeric_imputation: NumericImputation::default(),
            unmapped_source_policy: UnmappedSourcePolicy::default(),
            artifact_dir: PathBuf::from("artifacts"),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Upper date bound, resolved to today's date when unset.
    pub fn effective_max_date(&self) -> NaiveDate {
        self.max_date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(max_date) = self.max_date
            && max_date < self.min_date
        {
            return Err(ConfigValidationError::InvertedDateRange {
                min_date: self.min_date,
                max_date,
            });
        }

        if self.artifact_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyArtifactDir);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid date range: min_date {min_date} is after max_date {max_date}")]
    InvertedDateRange {
        min_date: NaiveDate,
        max_date: NaiveDate,
    },

    #[error("Artifact directory must not be empty")]
    EmptyArtifactDir,

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

impl From<ConfigValidationError> for crate::error::PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::PipelineError::InvalidConfig(err.to_string())
    }
}

/// Parse an ISO-8601 calendar date as given on the command line.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, ConfigValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigValidationError::InvalidDate(value.to_string()))
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    numeric_imputation: Option<NumericImputation>,
    unmapped_source_policy: Option<UnmappedSourcePolicy>,
    artifact_dir: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    /// Set the inclusive lower bound of the date filter.
    pub fn min_date(mut self, date: NaiveDate) -> Self {
        self.min_date = Some(date);
        self
    }

    /// Set the inclusive upper bound of the date filter.
    ///
    /// Leaving it unset makes the filter use the current date.
    pub fn max_date(mut self, date: NaiveDate) -> Self {
        self.max_date = Some(date);
        self
    }

    /// Set the continuous imputation strategy.
    pub fn numeric_imputation(mut self, strategy: NumericImputation) -> Self {
        self.numeric_imputation = Some(strategy);
        self
    }

    /// Set how sources outside the grouping map are handled.
    pub fn unmapped_source_policy(mut self, policy: UnmappedSourcePolicy) -> Self {
        self.unmapped_source_policy = Some(policy);
        self
    }

    /// Set the artifact directory.
    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            min_date: self.min_date.unwrap_or_else(default_min_date),
            max_date: self.max_date,
            numeric_imputation: self.numeric_imputation.unwrap_or_default(),
            unmapped_source_policy: self.unmapped_source_policy.unwrap_or_default(),
            artifact_dir: self
                .artifact_dir
                .unwrap_or_else(|| PathBuf::from("artifacts")),
        };

        config.validate()?;
        Ok(config)
    }
}
