//! Persisted feature column list.

use crate::error::Result;
use crate::utils::column_names;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ordered feature columns produced at training time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureColumns(Vec<String>);

impl FeatureColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self(columns)
    }

    /// Feature columns of a frame, in frame order.
    pub fn from_frame(df: &DataFrame) -> Self {
        Self(column_names(df))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    /// The same list without one column (e.g. the label at inference).
    pub fn without(&self, name: &str) -> Self {
        Self(self.0.iter().filter(|c| *c != name).cloned().collect())
    }

    /// Reindex a frame onto this column list.
    ///
    /// Absent columns are added as all-zero `Float64`, columns not in the list
    /// are dropped, and the result follows the stored order. Indicator levels
    /// never seen in training are therefore discarded.
    pub fn align(&self, df: &DataFrame) -> Result<DataFrame> {
        let height = df.height();
        let present = column_names(df);

        let unexpected: Vec<&String> = present.iter().filter(|c| !self.contains(c)).collect();
        if !unexpected.is_empty() {
            warn!("Dropping columns unknown at training time: {:?}", unexpected);
        }

        let mut columns = Vec::with_capacity(self.0.len());
        for name in &self.0 {
            let column = if present.contains(name) {
                df.column(name)?.cast(&DataType::Float64)?
            } else {
                Series::new(name.as_str().into(), vec![0.0f64; height]).into_column()
            };
            columns.push(column);
        }

        Ok(DataFrame::new(columns)?)
    }
}
