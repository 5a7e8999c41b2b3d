//! Main pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating the dataset and feature stages.

use crate::artifacts::{Artifact, ArtifactStore, ArtifactStoreExt, FsArtifactStore};
use crate::cleaner::{filter_by_date, DataCleaner};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::{derive_source_group, FeatureBuilder, FeatureFrame};
use crate::imputers::{ImputationValues, StatisticalImputer};
use crate::pipeline::executor::TransformExecutor;
use crate::pipeline::outliers::OutlierHandler;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::scaling::MinMaxScaler;
use crate::schema::LeadSchema;
use crate::types::{DatasetOutcome, RunSummary};
use crate::utils::column_names;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The lead preparation pipeline.
///
/// One pipeline value corresponds to one artifact store. Stores are
/// write-once, so a training run needs a fresh store (or a fresh pipeline
/// over a new [`FsArtifactStore`]).
///
/// # Example
///
/// ```rust,ignore
/// use lead_processing::{Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::builder().artifact_dir("artifacts").build()?)
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?;
///
/// let outcome = pipeline.make_dataset(raw)?;
/// let features = pipeline.build_features(outcome.gold)?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    schema: LeadSchema,
    store: Arc<dyn ArtifactStore>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &LeadSchema {
        &self.schema
    }

    /// The artifact store this pipeline writes to.
    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// Run ingestion, cleaning, imputation and scaling on a raw frame.
    ///
    /// Writes every training artifact and returns the gold frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyDataset`] when the date filter (or row
    /// cleaning) leaves no rows; the date limits are written before that.
    /// Returns [`PipelineError::Cancelled`] if the token was cancelled.
    pub fn make_dataset(&self, raw: DataFrame) -> Result<DatasetOutcome> {
        let result = self.make_dataset_internal(raw);
        self.finish(result, "Dataset run completed successfully")
    }

    /// Build the feature table from a gold frame and persist its column list.
    pub fn build_features(&self, gold: DataFrame) -> Result<FeatureFrame> {
        let result = self.build_features_internal(gold);
        self.finish(result, "Feature construction completed successfully")
    }

    fn finish<T>(&self, result: Result<T>, message: &str) -> Result<T> {
        match result {
            Ok(value) => {
                self.report_progress(ProgressUpdate::complete(message));
                Ok(value)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn begin(&self, stage: PipelineStage, message: &str) -> Result<()> {
        self.check_cancelled()?;
        info!("{}", message);
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
        Ok(())
    }

    fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        artifact: Artifact,
        value: &T,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.store.put_json(artifact, value)?;
        summary.record_artifact(artifact);
        Ok(())
    }

    fn put_frame(&self, artifact: Artifact, df: &DataFrame, summary: &mut RunSummary) -> Result<()> {
        self.store.put_frame(artifact, df)?;
        summary.record_artifact(artifact);
        Ok(())
    }

    fn make_dataset_internal(&self, raw: DataFrame) -> Result<DatasetOutcome> {
        let start_time = Instant::now();
        let schema = &self.schema;
        let cleaner = DataCleaner::new(schema);
        let executor = TransformExecutor::new(schema);

        let mut summary = RunSummary::new();
        summary.rows_before = raw.height();
        summary.columns_before = raw.width();
        let mut steps: Vec<String> = Vec::new();

        self.begin(PipelineStage::Initializing, "Starting dataset run...")?;

        // Step 1: Date filter
        self.begin(PipelineStage::DateFiltering, "Filtering records by date...")?;
        let max_date = self.config.effective_max_date();
        let rows_before = raw.height();
        let (df, limits) = filter_by_date(raw, &schema.date, self.config.min_date, max_date)?;
        self.put_json(Artifact::DateLimits, &limits, &mut summary)?;
        summary.add_step("date filter", rows_before, df.height());
        if df.height() == 0 {
            return Err(PipelineError::EmptyDataset(format!(
                "date filter [{}, {}]",
                self.config.min_date, max_date
            )));
        }

        // Step 2: Column selection
        self.begin(PipelineStage::ColumnSelection, "Dropping excluded columns...")?;
        let df = cleaner.select_features(df, &mut steps)?;

        // Step 3: Row cleaning
        self.begin(PipelineStage::RowCleaning, "Removing invalid rows...")?;
        let rows_before = df.height();
        let df = cleaner.clean_rows(df, &mut steps)?;
        summary.add_step("row cleaning", rows_before, df.height());
        if df.height() == 0 {
            return Err(PipelineError::EmptyDataset("row cleaning".to_string()));
        }

        // Step 4: Types and families
        self.begin(PipelineStage::TypeFixing, "Separating column families...")?;
        let df = cleaner.fix_categorical_types(df, &mut steps)?;
        let mut split = cleaner.separate_families(&df)?;
        drop(df);

        // Step 5: Outliers, summaries
        self.begin(PipelineStage::OutlierHandling, "Clipping continuous outliers...")?;
        OutlierHandler::clip_two_sigma(&mut split.continuous, &mut steps)?;
        let outlier_summary = OutlierHandler::summary_frame(&split.continuous)?;
        self.put_frame(Artifact::OutlierSummary, &outlier_summary, &mut summary)?;
        let modes = StatisticalImputer::mode_table(&split.categorical)?;
        self.put_frame(Artifact::CategoricalModes, &modes, &mut summary)?;

        // Step 6: Imputation
        self.begin(PipelineStage::Imputation, "Imputing missing values...")?;
        let values = ImputationValues::fit(&split, schema, self.config.numeric_imputation)?;
        self.put_json(Artifact::ImputationValues, &values, &mut summary)?;
        let split = executor.impute(split, &values, &mut steps)?;

        // Step 7: Scaling
        self.begin(PipelineStage::Scaling, "Fitting scaler...")?;
        let scaler = MinMaxScaler::fit(&split.continuous)?;
        self.put_json(Artifact::Scaler, &scaler, &mut summary)?;
        let split = executor.scale(split, &scaler)?;

        // Step 8: Snapshot and gold dataset
        self.begin(PipelineStage::Persisting, "Writing schema snapshot and gold dataset...")?;
        let combined = TransformExecutor::combine(&split)?;
        self.put_json(Artifact::ColumnsDrift, &column_names(&combined), &mut summary)?;
        self.put_frame(Artifact::TrainingData, &combined, &mut summary)?;

        let gold = derive_source_group(combined, schema, self.config.unmapped_source_policy)?;
        self.put_frame(Artifact::GoldData, &gold, &mut summary)?;

        summary.rows_after = gold.height();
        summary.columns_after = gold.width();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        summary.actions = steps;

        info!(
            "Dataset run finished: {} -> {} rows in {}ms",
            summary.rows_before, summary.rows_after, summary.duration_ms
        );
        for artifact in &summary.artifacts_written {
            debug!("Artifact: {}", self.store.location(*artifact));
        }

        Ok(DatasetOutcome { gold, summary })
    }

    fn build_features_internal(&self, gold: DataFrame) -> Result<FeatureFrame> {
        self.begin(PipelineStage::FeatureConstruction, "Building feature table...")?;

        let features = FeatureBuilder::new(&self.schema).build(gold)?;
        self.check_cancelled()?;
        self.store.put_json(Artifact::FeatureColumns, &features.columns)?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureConstruction,
            1.0,
            format!("Built {} feature columns", features.columns.len()),
        ));
        Ok(features)
    }
}

/// Builder for creating a [`Pipeline`] with custom configuration.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    schema: Option<LeadSchema>,
    store: Option<Arc<dyn ArtifactStore>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the column schema.
    pub fn schema(mut self, schema: LeadSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use a specific artifact store.
    ///
    /// Without one, the pipeline opens a [`FsArtifactStore`] at the
    /// configured artifact directory.
    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline between stages.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid or the default
    /// artifact directory cannot be created.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(FsArtifactStore::new(config.artifact_dir.clone())?),
        };

        Ok(Pipeline {
            config,
            schema: self.schema.unwrap_or_default(),
            store,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}
