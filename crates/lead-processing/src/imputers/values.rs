//! Fitted imputation values.

use super::StatisticalImputer;
use crate::artifacts::Artifact;
use crate::config::NumericImputation;
use crate::error::{PipelineError, Result};
use crate::schema::LeadSchema;
use crate::types::FamilySplit;
use crate::utils::has_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Fill values fitted once on training data and replayed on later data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationValues {
    pub numeric_policy: NumericImputation,
    /// Mean or median per continuous column.
    pub continuous: BTreeMap<String, f64>,
    /// Mode per categorical column.
    pub categorical: BTreeMap<String, String>,
}

impl ImputationValues {
    /// Fit fill values on the two column families.
    ///
    /// The customer code is mapped to its "no customer" marker before its
    /// mode is taken, so the stored mode reflects what imputation sees.
    pub fn fit(split: &FamilySplit, schema: &LeadSchema, policy: NumericImputation) -> Result<Self> {
        let mut continuous = BTreeMap::new();
        for column in split.continuous.get_columns() {
            let value =
                StatisticalImputer::numeric_statistic(column.as_materialized_series(), policy)?;
            continuous.insert(column.name().to_string(), value);
        }

        let mut categorical_df = split.categorical.clone();
        map_missing_customer_code(&mut categorical_df, schema, &mut Vec::new())?;

        let mut categorical = BTreeMap::new();
        for column in categorical_df.get_columns() {
            let value = StatisticalImputer::categorical_statistic(column.as_materialized_series())?;
            categorical.insert(column.name().to_string(), value);
        }

        info!(
            "Fitted imputation values for {} continuous and {} categorical columns",
            continuous.len(),
            categorical.len()
        );

        Ok(Self {
            numeric_policy: policy,
            continuous,
            categorical,
        })
    }

    /// Fill the continuous family with the stored values.
    pub fn apply_continuous(&self, df: DataFrame, steps: &mut Vec<String>) -> Result<DataFrame> {
        let mut df = df;
        let names: Vec<String> = crate::utils::column_names(&df);
        for name in &names {
            let value = *self.continuous.get(name).ok_or_else(|| missing_value(name))?;
            StatisticalImputer::fill_continuous(&mut df, name, value, steps)?;
        }
        Ok(df)
    }

    /// Fill the categorical family: customer code first, then stored modes.
    pub fn apply_categorical(
        &self,
        df: DataFrame,
        schema: &LeadSchema,
        steps: &mut Vec<String>,
    ) -> Result<DataFrame> {
        let mut df = df;
        map_missing_customer_code(&mut df, schema, steps)?;

        let names: Vec<String> = crate::utils::column_names(&df);
        for name in &names {
            let value = self.categorical.get(name).ok_or_else(|| missing_value(name))?;
            StatisticalImputer::fill_categorical(&mut df, name, value, steps)?;
        }
        Ok(df)
    }
}

/// Map a missing customer code to the schema's "no customer" marker.
///
/// A missing code means the lead is not a customer, so it becomes a real
/// category instead of being mode-imputed.
pub fn map_missing_customer_code(
    df: &mut DataFrame,
    schema: &LeadSchema,
    steps: &mut Vec<String>,
) -> Result<()> {
    if !has_column(df, &schema.customer_code) {
        return Ok(());
    }
    StatisticalImputer::fill_categorical(df, &schema.customer_code, &schema.missing_customer_code, steps)
}

fn missing_value(column: &str) -> PipelineError {
    PipelineError::ArtifactCorrupt {
        name: Artifact::ImputationValues.file_name().to_string(),
        reason: format!("no fill value for column '{}'", column),
    }
}
