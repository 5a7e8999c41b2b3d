//! Feature construction.
//!
//! Turns the gold dataset into a model-ready table: identifier and date
//! columns are removed, the schema's categorical columns are expanded into
//! drop-first indicators, and every column is coerced to `Float64`.
//!
//! Inference rebuilds the stored indicator columns one by one instead of
//! re-deriving levels from the batch, so the training reference level holds
//! whatever categories a batch contains.

mod columns;
pub mod encoding;
mod grouping;

pub use columns::FeatureColumns;
pub use encoding::{category_values, drop_first_indicators, level_indicator, to_float64};
pub use grouping::derive_source_group;

use crate::error::Result;
use crate::schema::LeadSchema;
use crate::utils::{has_column, require_columns};
use encoding::split_indicator;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// A model-ready feature table and its column list.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub frame: DataFrame,
    pub columns: FeatureColumns,
}

/// Builds the feature table from a gold dataset.
pub struct FeatureBuilder<'a> {
    schema: &'a LeadSchema,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(schema: &'a LeadSchema) -> Self {
        Self { schema }
    }

    /// Build features from a gold frame.
    ///
    /// Identifier and date columns must be present. Output columns are the
    /// remaining plain columns first, then indicators in expansion order.
    pub fn build(&self, gold: DataFrame) -> Result<FeatureFrame> {
        let df = self.drop_non_features(gold)?;
        self.encode(df)
    }

    /// Build features onto a stored column list.
    ///
    /// Every stored indicator `{column}_{level}` is rebuilt from the row's
    /// own value; levels the list does not name are discarded and stored
    /// columns the frame cannot produce are zeros. The result follows the
    /// stored order.
    pub fn build_aligned(&self, gold: DataFrame, stored: &FeatureColumns) -> Result<DataFrame> {
        let df = self.drop_non_features(gold)?;
        let expanded = self.present_expanded(&df);
        let mut columns = plain_columns(&df, &expanded)?;

        let mut values = HashMap::with_capacity(expanded.len());
        for name in &expanded {
            values.insert(*name, category_values(df.column(name)?.as_materialized_series())?);
        }

        let mut rebuilt = 0;
        for name in stored.as_slice() {
            if let Some((column, level)) = split_indicator(name, &expanded)
                && let Some(column_values) = values.get(column)
            {
                columns.push(level_indicator(name, column_values, level).into_column());
                rebuilt += 1;
            }
        }
        debug!("Rebuilt {} stored indicator columns", rebuilt);

        stored.align(&DataFrame::new(columns)?)
    }

    /// Expand and coerce a frame that no longer carries identifiers.
    pub fn encode(&self, df: DataFrame) -> Result<FeatureFrame> {
        let expanded = self.present_expanded(&df);

        let mut indicators = Vec::new();
        for name in &expanded {
            let series = df.column(name)?.as_materialized_series();
            let created = drop_first_indicators(series)?;
            debug!("Expanded '{}' into {} indicators", name, created.len());
            indicators.extend(created);
        }

        let mut columns = plain_columns(&df, &expanded)?;
        columns.extend(indicators.into_iter().map(|s| s.into_column()));

        let frame = DataFrame::new(columns)?;
        let feature_columns = FeatureColumns::from_frame(&frame);
        info!(
            "Built {} feature columns for {} rows",
            feature_columns.len(),
            frame.height()
        );

        Ok(FeatureFrame {
            frame,
            columns: feature_columns,
        })
    }

    fn drop_non_features(&self, gold: DataFrame) -> Result<DataFrame> {
        let non_features = self.schema.non_feature_columns();
        require_columns(&gold, &non_features)?;

        let cols_ref: Vec<PlSmallStr> = non_features.iter().map(|s| (*s).into()).collect();
        let df = gold.drop_many(cols_ref);
        debug!("Dropped identifier columns: {:?}", non_features);
        Ok(df)
    }

    /// Expanded columns present in the frame, in expansion order.
    fn present_expanded(&self, df: &DataFrame) -> Vec<&'a str> {
        self.schema
            .expanded_columns()
            .into_iter()
            .filter(|name| has_column(df, name))
            .collect()
    }
}

/// Every column that is not expanded, coerced to `Float64`, in frame order.
fn plain_columns(df: &DataFrame, expanded: &[&str]) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        if expanded.contains(&column.name().as_str()) {
            continue;
        }
        columns.push(to_float64(column.as_materialized_series())?.into_column());
    }
    Ok(columns)
}
