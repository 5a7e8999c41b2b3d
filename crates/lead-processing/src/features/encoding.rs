//! Indicator encoding and numeric coercion.

use crate::error::{PipelineError, Result};
use crate::utils::{category_series, is_numeric_dtype, sort_categories, string_values};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Expand a categorical column into drop-first indicator columns.
///
/// Distinct observed values are ordered with [`sort_categories`]; the first is
/// the reference level and gets no column. Each remaining value `v` yields a
/// `Float64` column `{name}_{v}` holding 1.0 where the row equals `v`. Missing
/// values produce zeros in every indicator.
pub fn drop_first_indicators(series: &Series) -> Result<Vec<Series>> {
    let name = series.name().to_string();
    let values = category_values(series)?;

    let distinct: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
    let mut categories: Vec<String> = distinct.into_iter().map(str::to_string).collect();
    sort_categories(&mut categories);

    Ok(categories
        .iter()
        .skip(1)
        .map(|category| level_indicator(&format!("{}_{}", name, category), &values, category))
        .collect())
}

/// Category labels of a column, as used in indicator names.
pub fn category_values(series: &Series) -> Result<Vec<Option<String>>> {
    string_values(&category_series(series)?)
}

/// `Float64` indicator named `name`: 1.0 where the value equals `level`.
pub fn level_indicator(name: &str, values: &[Option<String>], level: &str) -> Series {
    let indicator: Vec<f64> = values
        .iter()
        .map(|v| if v.as_deref() == Some(level) { 1.0 } else { 0.0 })
        .collect();
    Series::new(name.into(), indicator)
}

/// Split an indicator name into its source column and level.
///
/// The longest matching `{column}_` prefix wins, so `bin_source_group1`
/// belongs to `bin_source` even when `source` is also expanded.
pub fn split_indicator<'n>(name: &'n str, expanded: &[&str]) -> Option<(&'n str, &'n str)> {
    expanded
        .iter()
        .filter(|column| {
            name.len() > column.len() + 1
                && name.starts_with(**column)
                && name.as_bytes()[column.len()] == b'_'
        })
        .max_by_key(|column| column.len())
        .map(|column| name.split_at(column.len()))
        .map(|(column, rest)| (column, &rest[1..]))
}

/// Parse a textual cell as a number. Booleans map to 1.0 and 0.0.
fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok()
}

/// Convert one column to `Float64`.
///
/// Numeric and boolean columns are cast; text is parsed value by value and a
/// value that is not a number fails with
/// [`PipelineError::TypeConversionFailed`].
pub fn to_float64(series: &Series) -> Result<Series> {
    let dtype = series.dtype();
    if dtype == &DataType::Float64 {
        return Ok(series.clone());
    }
    if is_numeric_dtype(dtype) || dtype == &DataType::Boolean {
        return Ok(series.cast(&DataType::Float64)?);
    }

    let name = series.name().to_string();
    let parsed = string_values(series)?
        .into_iter()
        .map(|value| match value {
            None => Ok(None),
            Some(text) => parse_numeric(&text).map(Some).ok_or_else(|| {
                PipelineError::TypeConversionFailed {
                    column: name.clone(),
                    target_type: "Float64".to_string(),
                    reason: format!("'{}' is not numeric", text),
                }
            }),
        })
        .collect::<Result<Vec<Option<f64>>>>()?;

    Ok(Series::new(name.as_str().into(), parsed))
}
