//! Shared utilities for the lead preparation pipeline.
//!
//! Helpers used across stages for dtype checks, value extraction and
//! simple column statistics.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// Frame Utilities
// =============================================================================

/// Owned column names of a frame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Fail with [`PipelineError::ColumnNotFound`] for the first absent column.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let present = column_names(df);
    for name in names {
        if !present.iter().any(|c| c == name) {
            return Err(PipelineError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Check whether a frame has a column with this name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Values of a column as `f64`, keeping nulls.
pub fn f64_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Values of a column as strings, keeping nulls.
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Render a column as category labels.
///
/// Booleans become `True`/`False`, the spelling the raw export uses; every
/// other dtype is cast to `String`.
pub fn category_series(series: &Series) -> Result<Series> {
    if series.dtype() == &DataType::Boolean {
        let labels: Vec<Option<&str>> = series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { "True" } else { "False" }))
            .collect();
        return Ok(Series::new(series.name().clone(), labels));
    }
    Ok(series.cast(&DataType::String)?)
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Descriptive statistics of a numeric column over its observed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1); None below two observations.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericStats {
    /// Compute statistics of a Series (cast to `Float64`).
    pub fn from_series(series: &Series) -> Result<Self> {
        let values = series.cast(&DataType::Float64)?;
        let missing = values.null_count();
        let count = values.len() - missing;
        let mean = values.mean();

        let std = match mean {
            Some(mean) if count > 1 => {
                let ss: f64 = values
                    .f64()?
                    .into_iter()
                    .flatten()
                    .map(|v| (v - mean).powi(2))
                    .sum();
                Some((ss / (count - 1) as f64).sqrt())
            }
            _ => None,
        };

        Ok(Self {
            count,
            missing,
            mean,
            std,
            min: values.min::<f64>()?,
            max: values.max::<f64>()?,
        })
    }
}

/// Calculate the mode (most frequent value) of a Series as a string.
///
/// Ties resolve to the smallest value so the result is stable across runs.
pub fn string_mode(series: &Series) -> Result<Option<String>> {
    let mut value_counts: BTreeMap<String, usize> = BTreeMap::new();
    for val in string_values(series)?.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending key order; keep the first maximum.
    let mut best: Option<(String, usize)> = None;
    for (val, count) in value_counts {
        match &best {
            Some((_, best_count)) if *best_count >= count => {}
            _ => best = Some((val, count)),
        }
    }
    Ok(best.map(|(val, _)| val))
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> Result<Series> {
    let filled: Vec<f64> = f64_values(series)?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> Result<Series> {
    let filled: Vec<String> = string_values(series)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill_value.to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Order distinct category values: numerically when every value is a number,
/// otherwise lexicographically.
pub fn sort_categories(values: &mut [String]) {
    let all_numeric = values.iter().all(|v| v.trim().parse::<f64>().is_ok());
    if all_numeric {
        values.sort_by(|a, b| {
            let a = a.trim().parse::<f64>().unwrap_or(f64::NAN);
            let b = b.trim().parse::<f64>().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        });
    } else {
        values.sort();
    }
}

// =============================================================================
// Tests
// =============================================================================
