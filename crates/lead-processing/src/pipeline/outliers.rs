//! Outlier handling module.
//!
//! Continuous columns are clipped to two sample standard deviations around
//! their own mean. The bounds are not configurable.

use crate::error::Result;
use crate::utils::{f64_values, NumericStats};
use polars::prelude::*;
use tracing::debug;

/// Number of standard deviations kept on each side of the mean.
pub const CLIP_SIGMAS: f64 = 2.0;

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Clip every column of a continuous frame to `mean ± 2·std`.
    ///
    /// Statistics come from the column's observed values (ddof = 1). Columns
    /// with fewer than two observations are left alone. Nulls stay null.
    pub fn clip_two_sigma(df: &mut DataFrame, processing_steps: &mut Vec<String>) -> Result<()> {
        let names = crate::utils::column_names(df);
        let mut clipped_total = 0;

        for name in &names {
            let series = df.column(name)?.as_materialized_series().clone();
            let stats = NumericStats::from_series(&series)?;
            let values = f64_values(&series)?;

            let (Some(mean), Some(std)) = (stats.mean, stats.std) else {
                debug!("Skipping clipping of '{}': fewer than two values", name);
                continue;
            };
            let lower = mean - CLIP_SIGMAS * std;
            let upper = mean + CLIP_SIGMAS * std;

            let mut clipped = 0;
            let capped: Vec<Option<f64>> = values
                .into_iter()
                .map(|v| {
                    v.map(|val| {
                        if val < lower || val > upper {
                            clipped += 1;
                        }
                        val.clamp(lower, upper)
                    })
                })
                .collect();

            df.replace(name, Series::new(name.as_str().into(), capped))?;

            if clipped > 0 {
                processing_steps.push(format!(
                    "Clipped {} values in '{}' to [{:.4}, {:.4}]",
                    clipped, name, lower, upper
                ));
            }
            clipped_total += clipped;
        }

        debug!("Clipped {} values at mean ± {} std", clipped_total, CLIP_SIGMAS);
        Ok(())
    }

    /// Per-column summary of a continuous frame.
    ///
    /// Columns: `column`, `Count` (observed), `Missing`, `Mean`, `Min`, `Max`.
    pub fn summary_frame(df: &DataFrame) -> Result<DataFrame> {
        let width = df.width();
        let mut names = Vec::with_capacity(width);
        let mut counts = Vec::with_capacity(width);
        let mut missing = Vec::with_capacity(width);
        let mut means = Vec::with_capacity(width);
        let mut mins = Vec::with_capacity(width);
        let mut maxs = Vec::with_capacity(width);

        for column in df.get_columns() {
            let stats = NumericStats::from_series(column.as_materialized_series())?;
            names.push(column.name().to_string());
            counts.push(stats.count as u64);
            missing.push(stats.missing as u64);
            means.push(stats.mean);
            mins.push(stats.min);
            maxs.push(stats.max);
        }

        Ok(DataFrame::new(vec![
            Series::new("column".into(), names).into_column(),
            Series::new("Count".into(), counts).into_column(),
            Series::new("Missing".into(), missing).into_column(),
            Series::new("Mean".into(), means).into_column(),
            Series::new("Min".into(), mins).into_column(),
            Series::new("Max".into(), maxs).into_column(),
        ])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values_of(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        f64_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_clip_two_sigma_bounds() {
        let raw = vec![
            Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0),
            Some(6.0), Some(7.0), Some(8.0), Some(9.0), Some(100.0),
        ];
        let series = Series::new("value".into(), raw);
        let stats = NumericStats::from_series(&series).unwrap();
        let (mean, std) = (stats.mean.unwrap(), stats.std.unwrap());

        let mut df = DataFrame::new(vec![series.into_column()]).unwrap();
        let mut steps = Vec::new();
        OutlierHandler::clip_two_sigma(&mut df, &mut steps).unwrap();

        let clipped = values_of(&df, "value");
        assert_eq!(df.height(), 10);
        for v in clipped.iter().flatten() {
            assert!(*v >= mean - 2.0 * std - 1e-9);
            assert!(*v <= mean + 2.0 * std + 1e-9);
        }
        assert!((clipped[9].unwrap() - (mean + 2.0 * std)).abs() < 1e-9);
        assert_eq!(clipped[0], Some(1.0));
        assert!(steps[0].contains("Clipped 1 values in 'value'"));
    }

    #[test]
    fn test_clip_keeps_nulls_and_skips_single_value_columns() {
        let mut df = df![
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [None, Some(7.0), None],
        ]
        .unwrap();

        OutlierHandler::clip_two_sigma(&mut df, &mut Vec::new()).unwrap();

        assert_eq!(values_of(&df, "a"), vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(values_of(&df, "b"), vec![None, Some(7.0), None]);
    }

    #[test]
    fn test_summary_frame_counts_missing() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();

        let summary = OutlierHandler::summary_frame(&df).unwrap();

        assert_eq!(
            crate::utils::column_names(&summary),
            vec!["column", "Count", "Missing", "Mean", "Min", "Max"]
        );
        let cell = |name: &str| summary.column(name).unwrap().get(0).unwrap();
        assert_eq!(cell("Count").try_extract::<u64>().unwrap(), 2);
        assert_eq!(cell("Missing").try_extract::<u64>().unwrap(), 1);
        assert_eq!(cell("Mean").try_extract::<f64>().unwrap(), 2.0);
        assert_eq!(cell("Max").try_extract::<f64>().unwrap(), 3.0);
    }
}
