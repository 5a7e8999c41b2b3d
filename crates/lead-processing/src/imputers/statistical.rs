//! Statistical imputation methods.
//!
//! Provides mean, median and mode fills plus the categorical mode table.

use crate::config::NumericImputation;
use crate::error::{PipelineError, Result};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, string_mode};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill statistic of a continuous column under the given strategy.
    ///
    /// A column without any observed value fails with
    /// [`PipelineError::NoValidValues`].
    pub fn numeric_statistic(series: &Series, strategy: NumericImputation) -> Result<f64> {
        let values = series.cast(&DataType::Float64)?;
        let stat = match strategy {
            NumericImputation::Mean => values.mean(),
            NumericImputation::Median => values.median(),
        };
        stat.ok_or_else(|| PipelineError::NoValidValues(series.name().to_string()))
    }

    /// Most frequent value of a categorical column.
    pub fn categorical_statistic(series: &Series) -> Result<String> {
        string_mode(series)?.ok_or_else(|| PipelineError::NoValidValues(series.name().to_string()))
    }

    /// Fill the nulls of a continuous column with a value.
    pub fn fill_continuous(
        df: &mut DataFrame,
        col_name: &str,
        fill_value: f64,
        processing_steps: &mut Vec<String>,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let missing = series.null_count();
        if missing == 0 {
            return Ok(());
        }

        df.replace(col_name, fill_numeric_nulls(&series, fill_value)?)?;
        processing_steps.push(format!(
            "Filled {} missing values in '{}' with {:.4}",
            missing, col_name, fill_value
        ));
        debug!("Filled '{}' with {}", col_name, fill_value);
        Ok(())
    }

    /// Fill the nulls of a categorical column with a value.
    pub fn fill_categorical(
        df: &mut DataFrame,
        col_name: &str,
        fill_value: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let missing = series.null_count();
        if missing == 0 {
            return Ok(());
        }

        df.replace(col_name, fill_string_nulls(&series, fill_value)?)?;
        processing_steps.push(format!(
            "Filled {} missing values in '{}' with '{}'",
            missing, col_name, fill_value
        ));
        debug!("Filled '{}' with '{}'", col_name, fill_value);
        Ok(())
    }

    /// Table of the most frequent value of every categorical column.
    ///
    /// Columns: `column`, `mode`. An all-missing column has a null mode.
    pub fn mode_table(categorical: &DataFrame) -> Result<DataFrame> {
        let mut names = Vec::with_capacity(categorical.width());
        let mut modes = Vec::with_capacity(categorical.width());

        for column in categorical.get_columns() {
            names.push(column.name().to_string());
            modes.push(string_mode(column.as_materialized_series())?);
        }

        Ok(DataFrame::new(vec![
            Series::new("column".into(), names).into_column(),
            Series::new("mode".into(), modes).into_column(),
        ])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::string_values;

    #[test]
    fn test_numeric_statistic_mean_ignores_nulls() {
        let series = Series::new("x".into(), &[Some(1.0), Some(2.0), None, Some(3.0)]);
        let mean = StatisticalImputer::numeric_statistic(&series, NumericImputation::Mean).unwrap();
        assert_eq!(mean, 2.0);
    }

    #[test]
    fn test_numeric_statistic_median() {
        let series = Series::new("x".into(), &[Some(1.0), Some(10.0), None, Some(3.0)]);
        let median = StatisticalImputer::numeric_statistic(&series, NumericImputation::Median).unwrap();
        assert_eq!(median, 3.0);
    }

    #[test]
    fn test_numeric_statistic_median_even_count_averages() {
        let series = Series::new("x".into(), &[Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)]);
        let median = StatisticalImputer::numeric_statistic(&series, NumericImputation::Median).unwrap();
        assert_eq!(median, 2.5);
    }

    #[test]
    fn test_numeric_statistic_casts_integers() {
        let series = Series::new("x".into(), &[Some(1i64), None, Some(4)]);
        let mean = StatisticalImputer::numeric_statistic(&series, NumericImputation::Mean).unwrap();
        assert_eq!(mean, 2.5);
    }

    #[test]
    fn test_numeric_statistic_all_nulls() {
        let series = Series::new("x".into(), &[Option::<f64>::None, None]);
        let err = StatisticalImputer::numeric_statistic(&series, NumericImputation::Mean).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidValues(ref c) if c == "x"));
    }

    #[test]
    fn test_categorical_statistic() {
        let series = Series::new("c".into(), &[Some("a"), Some("a"), Some("b"), None]);
        assert_eq!(StatisticalImputer::categorical_statistic(&series).unwrap(), "a");
    }

    #[test]
    fn test_fill_continuous_basic() {
        let mut df = df![
            "values" => [Some(1.0), None, Some(5.0)],
        ]
        .unwrap();
        let mut steps = Vec::new();

        StatisticalImputer::fill_continuous(&mut df, "values", 3.0, &mut steps).unwrap();

        let values = df.column("values").unwrap();
        assert_eq!(values.null_count(), 0);
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert!(matches!(values.dtype(), DataType::Float64));
        assert!(steps[0].contains("Filled 1 missing values"));
    }

    #[test]
    fn test_fill_continuous_no_nulls_logs_nothing() {
        let mut df = df!["values" => [1.0, 2.0]].unwrap();
        let mut steps = Vec::new();
        StatisticalImputer::fill_continuous(&mut df, "values", 0.0, &mut steps).unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn test_fill_categorical_preserves_values() {
        let mut df = df![
            "category" => [None, Some("A"), None],
        ]
        .unwrap();
        let mut steps = Vec::new();

        StatisticalImputer::fill_categorical(&mut df, "category", "B", &mut steps).unwrap();

        let values = string_values(df.column("category").unwrap().as_materialized_series()).unwrap();
        assert_eq!(
            values,
            vec![Some("B".to_string()), Some("A".to_string()), Some("B".to_string())]
        );
    }

    #[test]
    fn test_fill_missing_column_is_error() {
        let mut df = df!["other" => [1.0]].unwrap();
        let result = StatisticalImputer::fill_continuous(&mut df, "values", 0.0, &mut Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_table() {
        let df = df![
            "source" => [Some("signup"), Some("signup"), Some("li")],
            "onboarding" => [Some("True"), Some("False"), None],
        ]
        .unwrap();

        let table = StatisticalImputer::mode_table(&df).unwrap();

        assert_eq!(table.shape(), (2, 2));
        let modes = string_values(table.column("mode").unwrap().as_materialized_series()).unwrap();
        // tie between "False" and "True" resolves to the smaller value
        assert_eq!(modes, vec![Some("signup".to_string()), Some("False".to_string())]);
    }
}
