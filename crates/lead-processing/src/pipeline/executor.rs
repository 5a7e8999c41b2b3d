//! Transform executor.
//!
//! Applies fitted imputation values and a fitted scaler to a family split and
//! recombines the families. Training and inference share this code so both
//! replay the exact same transformations.

use crate::error::{PipelineError, Result};
use crate::imputers::ImputationValues;
use crate::scaling::MinMaxScaler;
use crate::schema::LeadSchema;
use crate::types::FamilySplit;
use polars::prelude::*;
use tracing::{debug, info};

/// Executes fitted transformations on a [`FamilySplit`].
pub struct TransformExecutor<'a> {
    schema: &'a LeadSchema,
}

impl<'a> TransformExecutor<'a> {
    pub fn new(schema: &'a LeadSchema) -> Self {
        Self { schema }
    }

    /// Fill both families with stored values.
    pub fn impute(
        &self,
        split: FamilySplit,
        values: &ImputationValues,
        processing_steps: &mut Vec<String>,
    ) -> Result<FamilySplit> {
        let continuous = values.apply_continuous(split.continuous, processing_steps)?;
        let categorical = values.apply_categorical(split.categorical, self.schema, processing_steps)?;

        let remaining: usize = continuous
            .get_columns()
            .iter()
            .chain(categorical.get_columns())
            .map(|c| c.null_count())
            .sum();
        debug!("Missing values remaining after imputation: {}", remaining);

        Ok(FamilySplit {
            continuous,
            categorical,
        })
    }

    /// Scale the continuous family with a fitted scaler.
    pub fn scale(&self, split: FamilySplit, scaler: &MinMaxScaler) -> Result<FamilySplit> {
        Ok(FamilySplit {
            continuous: scaler.transform(&split.continuous)?,
            categorical: split.categorical,
        })
    }

    /// Concatenate the families: categorical columns first, then continuous.
    ///
    /// The halves must have the same height; anything else means rows were
    /// lost or reordered in one family only.
    pub fn combine(split: &FamilySplit) -> Result<DataFrame> {
        let (cat_height, cont_height) = (split.categorical.height(), split.continuous.height());
        let both_present = split.categorical.width() > 0 && split.continuous.width() > 0;
        if both_present && cat_height != cont_height {
            return Err(PipelineError::Internal(format!(
                "family heights differ: categorical {} vs continuous {}",
                cat_height, cont_height
            )));
        }

        let mut columns: Vec<Column> = split.categorical.get_columns().to_vec();
        columns.extend(split.continuous.get_columns().iter().cloned());
        let combined = DataFrame::new(columns)?;

        info!(
            "Combined frame: {} rows x {} columns",
            combined.height(),
            combined.width()
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NumericImputation;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    fn split() -> FamilySplit {
        FamilySplit {
            continuous: df!["time_spent" => [Some(2.0), None, Some(6.0)]].unwrap(),
            categorical: df![
                "lead_id" => ["a", "b", "c"],
                "customer_code" => [Some("x"), None, None],
            ]
            .unwrap(),
        }
    }

    #[test]
    fn test_impute_scale_combine() {
        let schema = LeadSchema::default();
        let executor = TransformExecutor::new(&schema);
        let split = split();
        let values = ImputationValues::fit(&split, &schema, NumericImputation::Mean).unwrap();
        let mut steps = Vec::new();

        let imputed = executor.impute(split, &values, &mut steps).unwrap();
        let scaler = MinMaxScaler::fit(&imputed.continuous).unwrap();
        let scaled = executor.scale(imputed, &scaler).unwrap();
        let combined = TransformExecutor::combine(&scaled).unwrap();

        assert_eq!(
            column_names(&combined),
            vec!["lead_id", "customer_code", "time_spent"]
        );
        let time = crate::utils::f64_values(
            combined.column("time_spent").unwrap().as_materialized_series(),
        )
        .unwrap();
        assert_eq!(time, vec![Some(0.0), Some(0.5), Some(1.0)]);
        assert_eq!(combined.column("customer_code").unwrap().null_count(), 0);
    }

    #[test]
    fn test_combine_rejects_height_mismatch() {
        let split = FamilySplit {
            continuous: df!["x" => [1.0, 2.0]].unwrap(),
            categorical: df!["y" => ["a"]].unwrap(),
        };
        let err = TransformExecutor::combine(&split).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_combine_with_empty_family() {
        let split = FamilySplit {
            continuous: DataFrame::empty(),
            categorical: df!["y" => ["a", "b"]].unwrap(),
        };
        let combined = TransformExecutor::combine(&split).unwrap();
        assert_eq!(combined.shape(), (2, 1));
    }
}
