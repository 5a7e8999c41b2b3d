//! Inference-time preparation.
//!
//! Replays a finished training run on new raw records. Every fitted value
//! comes from the artifact store: nothing is re-clipped or re-fitted, so a
//! batch scored later sees exactly the transformations the training data saw.
//!
//! ```rust,ignore
//! use lead_processing::{ArtifactBundle, FsArtifactStore, InferencePreparer, LeadSchema};
//!
//! let store = FsArtifactStore::new("artifacts")?;
//! let bundle = ArtifactBundle::load(&store)?;
//! let batch = InferencePreparer::new(bundle, LeadSchema::default(), Default::default())
//!     .prepare(raw)?;
//! ```

use crate::artifacts::{Artifact, ArtifactStore, ArtifactStoreExt};
use crate::cleaner::{DataCleaner, date_series, parse_date_column};
use crate::config::UnmappedSourcePolicy;
use crate::error::{PipelineError, Result, ResultExt};
use crate::features::{FeatureBuilder, FeatureColumns, derive_source_group, to_float64};
use crate::imputers::ImputationValues;
use crate::pipeline::TransformExecutor;
use crate::scaling::MinMaxScaler;
use crate::schema::LeadSchema;
use crate::types::FamilySplit;
use crate::utils::{category_series, column_names, has_column};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Everything a training run persisted that inference needs.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub scaler: MinMaxScaler,
    pub imputation: ImputationValues,
    /// Processed column names at the end of training, label included.
    pub schema_snapshot: Vec<String>,
    pub features: FeatureColumns,
}

impl ArtifactBundle {
    /// Load the bundle. An absent artifact fails with
    /// [`PipelineError::ArtifactNotFound`].
    pub fn load(store: &dyn ArtifactStore) -> Result<Self> {
        let scaler: MinMaxScaler = store.get_json(Artifact::Scaler)?;
        let imputation: ImputationValues = store.get_json(Artifact::ImputationValues)?;
        let schema_snapshot: Vec<String> = store.get_json(Artifact::ColumnsDrift)?;
        let features: FeatureColumns = store.get_json(Artifact::FeatureColumns)?;

        info!(
            "Loaded artifacts: {} snapshot columns, {} feature columns",
            schema_snapshot.len(),
            features.len()
        );
        Ok(Self {
            scaler,
            imputation,
            schema_snapshot,
            features,
        })
    }
}

/// Compare a column set with the training snapshot.
///
/// Order is ignored. Any column missing from `actual` or not present in
/// `expected` fails with [`PipelineError::SchemaDrift`].
pub fn check_schema_drift(expected: &[String], actual: &[String]) -> Result<()> {
    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !actual.contains(c))
        .cloned()
        .collect();
    let unexpected: Vec<String> = actual
        .iter()
        .filter(|c| !expected.contains(c))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        debug!("No schema drift across {} columns", expected.len());
        return Ok(());
    }
    warn!(
        "Schema drift: missing {:?}, unexpected {:?}",
        missing, unexpected
    );
    Err(PipelineError::SchemaDrift {
        missing,
        unexpected,
    })
}

/// A scored-ready batch.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// Features aligned to the training feature list, label excluded.
    pub features: DataFrame,
    /// Lead ids in row order, for joining predictions back.
    pub lead_ids: Series,
    /// Labels, when the raw batch carried them.
    pub labels: Option<Series>,
}

/// Turns raw records into model inputs using persisted artifacts.
pub struct InferencePreparer {
    bundle: ArtifactBundle,
    schema: LeadSchema,
    unmapped_source_policy: UnmappedSourcePolicy,
}

impl InferencePreparer {
    pub fn new(
        bundle: ArtifactBundle,
        schema: LeadSchema,
        unmapped_source_policy: UnmappedSourcePolicy,
    ) -> Self {
        Self {
            bundle,
            schema,
            unmapped_source_policy,
        }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Prepare a raw batch.
    ///
    /// No date or source filtering happens here and the label may be absent.
    pub fn prepare(&self, raw: DataFrame) -> Result<PreparedBatch> {
        let schema = &self.schema;
        let cleaner = DataCleaner::new(schema);
        let mut steps = Vec::new();

        let df = cleaner
            .select_features(raw, &mut steps)
            .context("inference column selection")?;
        let df = cleaner.normalize_blanks(df)?;
        let df = self.parse_dates(df)?;
        let mut df = cleaner.fix_categorical_types(df, &mut steps)?;

        let labels = if has_column(&df, &schema.label) {
            let label = df.drop_in_place(&schema.label)?;
            Some(label.take_materialized_series())
        } else {
            None
        };

        let expected: Vec<String> = self
            .bundle
            .schema_snapshot
            .iter()
            .filter(|c| **c != schema.label)
            .cloned()
            .collect();
        check_schema_drift(&expected, &column_names(&df))?;

        let split = self.split_like_training(&df, &expected)?;
        drop(df);

        let executor = TransformExecutor::new(schema);
        let split = executor.impute(split, &self.bundle.imputation, &mut steps)?;
        let split = executor.scale(split, &self.bundle.scaler)?;
        let combined = TransformExecutor::combine(&split)?;

        let lead_ids = combined
            .column(&schema.lead_id)?
            .as_materialized_series()
            .clone();
        let grouped = derive_source_group(combined, schema, self.unmapped_source_policy)?;
        let stored = self.bundle.features.without(&schema.label);
        let features = FeatureBuilder::new(schema).build_aligned(grouped, &stored)?;

        for step in &steps {
            debug!("{}", step);
        }
        info!(
            "Prepared inference batch: {} rows x {} features",
            features.height(),
            features.width()
        );

        Ok(PreparedBatch {
            features,
            lead_ids,
            labels,
        })
    }

    fn parse_dates(&self, df: DataFrame) -> Result<DataFrame> {
        let name = self.schema.date.as_str();
        if !has_column(&df, name) {
            return Ok(df);
        }
        let dates = parse_date_column(df.column(name)?.as_materialized_series())?;
        let mut df = df;
        df.replace(name, date_series(name, &dates)?)?;
        Ok(df)
    }

    /// Rebuild the family split in snapshot order. Continuous columns are
    /// the ones the imputation artifact holds a numeric fill value for.
    fn split_like_training(&self, df: &DataFrame, order: &[String]) -> Result<FamilySplit> {
        let mut continuous = Vec::new();
        let mut categorical = Vec::new();

        for name in order {
            let series = df.column(name)?.as_materialized_series();
            if self.bundle.imputation.continuous.contains_key(name) {
                continuous.push(to_float64(series)?.into_column());
            } else {
                categorical.push(category_series(series)?.into_column());
            }
        }

        Ok(FamilySplit {
            continuous: DataFrame::new(continuous)?,
            categorical: DataFrame::new(categorical)?,
        })
    }
}
