//! Min-max feature scaling.

use crate::error::{PipelineError, Result};
use crate::utils::f64_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted range of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    fn scale(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }
}

/// Scales continuous columns to `[0, 1]` with ranges fitted once.
///
/// A constant column maps to `0.0`. Values outside the fitted range (only
/// possible on data the scaler was not fitted on) fall outside `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    ranges: Vec<ColumnRange>,
}

impl MinMaxScaler {
    /// Fit ranges on every column of a continuous frame.
    pub fn fit(df: &DataFrame) -> Result<Self> {
        let mut ranges = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let name = column.name().to_string();
            let values = column.as_materialized_series().cast(&DataType::Float64)?;
            let (Some(min), Some(max)) = (values.min::<f64>()?, values.max::<f64>()?) else {
                return Err(PipelineError::NoValidValues(name));
            };
            debug!("Scaler range for '{}': [{}, {}]", name, min, max);
            ranges.push(ColumnRange { column: name, min, max });
        }
        Ok(Self { ranges })
    }

    /// Columns the scaler was fitted on, in fit order.
    pub fn columns(&self) -> Vec<&str> {
        self.ranges.iter().map(|r| r.column.as_str()).collect()
    }

    pub fn ranges(&self) -> &[ColumnRange] {
        &self.ranges
    }

    /// Scale the fitted columns of a frame; other columns pass through.
    ///
    /// Every fitted column must be present.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for range in &self.ranges {
            let column = df
                .column(&range.column)
                .map_err(|_| PipelineError::ColumnNotFound(range.column.clone()))?;
            let scaled: Vec<Option<f64>> = f64_values(column.as_materialized_series())?
                .into_iter()
                .map(|v| v.map(|x| range.scale(x)))
                .collect();
            result.replace(&range.column, Series::new(range.column.as_str().into(), scaled))?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        f64_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_minmax_range() {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();

        let scaler = MinMaxScaler::fit(&df).unwrap();
        let scaled = scaler.transform(&df).unwrap();

        assert_eq!(scaler.columns(), vec!["a"]);
        assert_eq!(
            values(&scaled, "a"),
            vec![Some(0.0), Some(0.25), Some(0.5), Some(0.75), Some(1.0)]
        );
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let df = df!["c" => [7.0, 7.0, 7.0]].unwrap();
        let scaled = MinMaxScaler::fit(&df).unwrap().transform(&df).unwrap();
        assert_eq!(values(&scaled, "c"), vec![Some(0.0); 3]);
    }

    #[test]
    fn test_fit_ignores_nulls_and_rejects_empty_columns() {
        let df = df!["a" => [Some(2.0), None, Some(6.0)]].unwrap();
        let scaler = MinMaxScaler::fit(&df).unwrap();
        assert_eq!((scaler.ranges()[0].min, scaler.ranges()[0].max), (2.0, 6.0));
        assert_eq!(values(&scaler.transform(&df).unwrap(), "a"), vec![Some(0.0), None, Some(1.0)]);

        let empty = df!["e" => [Option::<f64>::None, None]].unwrap();
        let err = MinMaxScaler::fit(&empty).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidValues(ref c) if c == "e"));
    }

    #[test]
    fn test_transform_is_repeatable() {
        let df = df!["a" => [3.0, -1.0, 10.0]].unwrap();
        let scaler = MinMaxScaler::fit(&df).unwrap();
        let first = scaler.transform(&df).unwrap();
        let second = scaler.transform(&df).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_transform_requires_fitted_columns() {
        let scaler = MinMaxScaler::fit(&df!["a" => [1.0, 2.0]].unwrap()).unwrap();
        let err = scaler.transform(&df!["b" => [1.0]].unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound(ref c) if c == "a"));
    }

    #[test]
    fn test_serialized_scaler_transforms_identically() {
        let df = df!["a" => [0.0, 5.0, 10.0], "b" => [2.0, 2.0, 4.0]].unwrap();
        let scaler = MinMaxScaler::fit(&df).unwrap();

        let json = serde_json::to_string(&scaler).unwrap();
        let restored: MinMaxScaler = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, scaler);
        assert!(restored.transform(&df).unwrap().equals(&scaler.transform(&df).unwrap()));
    }
}
