//! Artifact persistence.
//!
//! Every fitted parameter and every intermediate dataset the pipeline
//! produces is written through an [`ArtifactStore`]. Stages never hand
//! in-memory state to each other across the stage boundary; later stages and
//! the inference consumer read these artifacts back.
//!
//! # Example
//!
//! ```rust,ignore
//! use lead_processing::artifacts::{Artifact, ArtifactStoreExt, FsArtifactStore};
//!
//! let store = FsArtifactStore::new("artifacts")?;
//! let columns: Vec<String> = store.get_json(Artifact::ColumnsDrift)?;
//! ```

mod store;

pub use store::{ArtifactStore, ArtifactStoreExt, FsArtifactStore, MemoryArtifactStore};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named side files of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// Realized min/max dates after the date filter
    DateLimits,
    /// Per-column Count/Missing/Mean/Min/Max after clipping
    OutlierSummary,
    /// Most frequent value of every categorical column
    CategoricalModes,
    /// Fill values used by imputation
    ImputationValues,
    /// Fitted min-max scaler
    Scaler,
    /// Processed column names (schema snapshot)
    ColumnsDrift,
    /// Processed dataset at snapshot time
    TrainingData,
    /// Final dataset with the derived grouping column
    GoldData,
    /// Ordered feature column list produced by feature construction
    FeatureColumns,
}

impl Artifact {
    /// All artifacts, in the order a full run writes them.
    pub const ALL: [Artifact; 9] = [
        Artifact::DateLimits,
        Artifact::OutlierSummary,
        Artifact::CategoricalModes,
        Artifact::ImputationValues,
        Artifact::Scaler,
        Artifact::ColumnsDrift,
        Artifact::TrainingData,
        Artifact::GoldData,
        Artifact::FeatureColumns,
    ];

    /// File name of the artifact inside the store.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::DateLimits => "date_limits.json",
            Self::OutlierSummary => "outlier_summary.csv",
            Self::CategoricalModes => "cat_missing_impute.csv",
            Self::ImputationValues => "imputation_values.json",
            Self::Scaler => "scaler.json",
            Self::ColumnsDrift => "columns_drift.json",
            Self::TrainingData => "training_data.csv",
            Self::GoldData => "train_data_gold.csv",
            Self::FeatureColumns => "feature_columns.json",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Date coverage actually present after filtering.
///
/// Both fields are `None` when the filter left no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateLimits {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl DateLimits {
    /// Limits of an empty selection.
    pub fn empty() -> Self {
        Self {
            min_date: None,
            max_date: None,
        }
    }

    /// Realized limits of a set of dates.
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        let mut limits = Self::empty();
        for date in dates {
            limits.min_date = Some(limits.min_date.map_or(date, |d| d.min(date)));
            limits.max_date = Some(limits.max_date.map_or(date, |d| d.max(date)));
        }
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_file_names_are_unique() {
        let mut names: Vec<&str> = Artifact::ALL.iter().map(|a| a.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Artifact::ALL.len());
    }

    #[test]
    fn test_date_limits_from_dates() {
        let limits = DateLimits::from_dates([date(2024, 1, 9), date(2024, 1, 2), date(2024, 1, 30)]);
        assert_eq!(limits.min_date, Some(date(2024, 1, 2)));
        assert_eq!(limits.max_date, Some(date(2024, 1, 30)));
    }

    #[test]
    fn test_empty_date_limits_serialize_as_null() {
        let json = serde_json::to_string(&DateLimits::from_dates(Vec::<NaiveDate>::new())).unwrap();
        assert_eq!(json, r#"{"min_date":null,"max_date":null}"#);
    }

    #[test]
    fn test_date_limits_serialize_as_iso_strings() {
        let limits = DateLimits::from_dates([date(2024, 1, 5)]);
        let json = serde_json::to_string(&limits).unwrap();
        assert_eq!(json, r#"{"min_date":"2024-01-05","max_date":"2024-01-05"}"#);
    }
}
