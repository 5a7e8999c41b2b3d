//! Date parsing and range filtering.

use crate::artifacts::DateLimits;
use crate::error::{PipelineError, Result};
use crate::utils::string_values;
use chrono::{NaiveDate, ParseError};
use polars::prelude::*;
use tracing::{debug, info};

// NaiveDate's default is the Unix epoch, the origin of polars `Date`.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn to_epoch_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(days as i64))
}

/// Parse one textual date.
///
/// Accepts `YYYY-MM-DD` and datetimes whose first ten characters are a
/// `YYYY-MM-DD` date. Blank input is missing, not invalid.
pub fn parse_date_value(value: &str) -> std::result::Result<Option<NaiveDate>, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map(Some)
}

/// Parse a date column into calendar dates, keeping nulls.
///
/// Handles `Date`, `Datetime` and textual columns. A non-empty value that is
/// not a date fails with [`PipelineError::InvalidDate`].
pub fn parse_date_column(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    let column = series.name().to_string();

    match series.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let days = series.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(from_epoch_days))
                .collect())
        }
        _ => string_values(series)?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(raw) => parse_date_value(&raw).map_err(|_| PipelineError::InvalidDate {
                    column: column.clone(),
                    value: raw.clone(),
                }),
            })
            .collect(),
    }
}

/// Build a polars `Date` series from calendar dates.
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> Result<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(to_epoch_days)).collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?)
}

/// Keep rows whose date lies in `[min_date, max_date]`.
///
/// Missing dates never match. The surviving date column is stored as `Date`.
/// Returns the filtered frame and the dates actually observed in it.
pub fn filter_by_date(
    df: DataFrame,
    date_column: &str,
    min_date: NaiveDate,
    max_date: NaiveDate,
) -> Result<(DataFrame, DateLimits)> {
    let series = df
        .column(date_column)
        .map_err(|_| PipelineError::ColumnNotFound(date_column.to_string()))?
        .as_materialized_series()
        .clone();

    let dates = parse_date_column(&series)?;
    let mask_values: Vec<bool> = dates
        .iter()
        .map(|d| d.is_some_and(|d| d >= min_date && d <= max_date))
        .collect();
    let limits = DateLimits::from_dates(
        dates
            .iter()
            .zip(&mask_values)
            .filter_map(|(d, keep)| if *keep { *d } else { None }),
    );

    let mut df = df;
    df.replace(date_column, date_series(date_column, &dates)?)?;

    let before = df.height();
    let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
    let df = df.filter(&mask)?;

    info!(
        "Date filter [{}, {}] kept {} of {} rows",
        min_date,
        max_date,
        df.height(),
        before
    );
    debug!("Realized date limits: {:?}", limits);

    Ok((df, limits))
}
