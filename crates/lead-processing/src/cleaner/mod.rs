//! Ingestion and cleaning of raw lead records.
//!
//! This module provides functionality for:
//! - Filtering records to a date range
//! - Dropping excluded columns
//! - Removing rows without a label or lead id, and non-signup rows
//! - Casting forced-categorical columns
//! - Separating continuous and categorical column families

mod dates;

pub use dates::{date_series, filter_by_date, parse_date_column, parse_date_value};

use crate::error::{PipelineError, Result};
use crate::schema::LeadSchema;
use crate::types::FamilySplit;
use crate::utils::{category_series, has_column, is_numeric_dtype, require_columns, string_values};
use polars::prelude::*;
use tracing::{debug, info};

/// Cleaner for the raw lead export, driven by a [`LeadSchema`].
pub struct DataCleaner<'a> {
    schema: &'a LeadSchema,
}

impl<'a> DataCleaner<'a> {
    pub fn new(schema: &'a LeadSchema) -> Self {
        Self { schema }
    }

    /// Drop the columns the schema marks as excluded.
    ///
    /// Every excluded column must be present; an absent one is a schema error.
    pub fn select_features(&self, df: DataFrame, actions: &mut Vec<String>) -> Result<DataFrame> {
        let dropped = self.schema.dropped_columns();
        require_columns(&df, &dropped)?;

        let cols_ref: Vec<PlSmallStr> = dropped.iter().map(|s| (*s).into()).collect();
        let df = df.drop_many(cols_ref);

        actions.push(format!("Dropped {} excluded columns: {:?}", dropped.len(), dropped));
        debug!("Dropped excluded columns: {:?}", dropped);
        Ok(df)
    }

    /// Normalize blank identifiers and labels to missing, then keep rows that
    /// have a label, a lead id and the signup source.
    pub fn clean_rows(&self, df: DataFrame, actions: &mut Vec<String>) -> Result<DataFrame> {
        let schema = self.schema;
        require_columns(
            &df,
            &[
                schema.label.as_str(),
                schema.lead_id.as_str(),
                schema.customer_code.as_str(),
                schema.source.as_str(),
            ],
        )?;

        let df = self.normalize_blanks(df)?;

        let before = df.height();
        let label_present = df.column(&schema.label)?.is_not_null();
        let id_present = df.column(&schema.lead_id)?.is_not_null();
        let from_signup: Vec<bool> = string_values(df.column(&schema.source)?.as_materialized_series())?
            .iter()
            .map(|v| v.as_deref() == Some(schema.signup_source.as_str()))
            .collect();
        let from_signup = BooleanChunked::from_slice("signup".into(), &from_signup);

        let mask = &(&label_present & &id_present) & &from_signup;
        let df = df.filter(&mask)?;

        let removed = before - df.height();
        if removed > 0 {
            let pct = (removed as f64 / before as f64) * 100.0;
            actions.push(format!(
                "Removed {} rows without label/lead id or outside source '{}' ({:.1}%)",
                removed, schema.signup_source, pct
            ));
        } else {
            actions.push("No rows removed by row cleaning".to_string());
        }
        info!("Row cleaning kept {} of {} rows", df.height(), before);

        Ok(df)
    }

    /// Turn whitespace-only labels, lead ids and customer codes into missing
    /// values. Absent columns are skipped.
    pub fn normalize_blanks(&self, df: DataFrame) -> Result<DataFrame> {
        let schema = self.schema;
        let mut df = df;
        for name in [&schema.label, &schema.lead_id, &schema.customer_code] {
            if has_column(&df, name) {
                blank_to_null(&mut df, name)?;
            }
        }
        Ok(df)
    }

    /// Cast every forced-categorical column that is present to `String`.
    /// Booleans are spelled `True`/`False`.
    pub fn fix_categorical_types(&self, df: DataFrame, actions: &mut Vec<String>) -> Result<DataFrame> {
        let mut df = df;
        let mut cast = Vec::new();

        for name in self.schema.forced_categorical() {
            if !has_column(&df, name) {
                continue;
            }
            let column = df.column(name)?;
            if column.dtype() == &DataType::String {
                continue;
            }
            let converted = category_series(column.as_materialized_series()).map_err(|e| {
                PipelineError::TypeConversionFailed {
                    column: name.to_string(),
                    target_type: "String".to_string(),
                    reason: e.to_string(),
                }
            })?;
            df.replace(name, converted)?;
            cast.push(name);
        }

        if !cast.is_empty() {
            actions.push(format!("Cast {} columns to categorical: {:?}", cast.len(), cast));
            debug!("Cast to categorical: {:?}", cast);
        }
        Ok(df)
    }

    /// Split a frame into continuous (`Float64`) and categorical (`String`)
    /// sub-frames that keep the original row order.
    pub fn separate_families(&self, df: &DataFrame) -> Result<FamilySplit> {
        let mut continuous = Vec::new();
        let mut categorical = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            let forced = self
                .schema
                .spec(name)
                .is_some_and(|spec| spec.force_categorical);

            if is_numeric_dtype(column.dtype()) && !forced {
                continuous.push(column.cast(&DataType::Float64)?);
            } else {
                categorical.push(category_series(column.as_materialized_series())?.into_column());
            }
        }

        let split = FamilySplit {
            continuous: DataFrame::new(continuous)?,
            categorical: DataFrame::new(categorical)?,
        };
        info!(
            "Separated {} continuous and {} categorical columns",
            split.continuous.width(),
            split.categorical.width()
        );
        Ok(split)
    }
}

/// Replace whitespace-only strings with nulls in a textual column.
fn blank_to_null(df: &mut DataFrame, name: &str) -> Result<()> {
    let column = df.column(name)?;
    if column.dtype() != &DataType::String {
        return Ok(());
    }
    let normalized: Vec<Option<String>> = string_values(column.as_materialized_series())?
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect();
    df.replace(name, Series::new(name.into(), normalized))?;
    Ok(())
}
