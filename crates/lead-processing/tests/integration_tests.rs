//! Integration tests for the lead preparation pipeline.
//!
//! These tests run the dataset and feature stages end to end on a small raw
//! export and replay the persisted artifacts for inference.

use chrono::NaiveDate;
use lead_processing::io::{read_csv, read_optional_csv, write_csv};
use lead_processing::utils::{column_names, f64_values, string_values};
use lead_processing::{
    Artifact, ArtifactBundle, ArtifactStore, ArtifactStoreExt, CancellationToken, DateLimits,
    FeatureColumns, FsArtifactStore, ImputationValues, InferencePreparer, LeadSchema,
    MemoryArtifactStore, NumericImputation, Pipeline, PipelineConfig, PipelineError,
    PipelineStage, ProgressUpdate, UnmappedSourcePolicy,
};
use parking_lot::Mutex;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_raw() -> DataFrame {
    read_csv(fixtures_path().join("raw_leads.csv")).expect("Failed to read fixture")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config_for(min: NaiveDate, max: NaiveDate) -> PipelineConfig {
    PipelineConfig::builder()
        .min_date(min)
        .max_date(max)
        .build()
        .unwrap()
}

fn january() -> PipelineConfig {
    config_for(date(2024, 1, 1), date(2024, 1, 31))
}

fn memory_pipeline(config: PipelineConfig) -> (Pipeline, Arc<MemoryArtifactStore>) {
    let store = Arc::new(MemoryArtifactStore::new());
    let pipeline = Pipeline::builder()
        .config(config)
        .artifact_store(store.clone())
        .build()
        .unwrap();
    (pipeline, store)
}

fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    f64_values(df.column(name).unwrap().as_materialized_series()).unwrap()
}

fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    string_values(df.column(name).unwrap().as_materialized_series()).unwrap()
}

// ============================================================================
// Dataset Stage
// ============================================================================

#[test]
fn test_january_window_keeps_only_january_rows() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();

    let limits: DateLimits = store.get_json(Artifact::DateLimits).unwrap();
    assert_eq!(limits.min_date, Some(date(2024, 1, 2)));
    assert_eq!(limits.max_date, Some(date(2024, 1, 28)));

    let steps = &outcome.summary.steps;
    assert_eq!(steps[0].step, "date filter");
    assert_eq!((steps[0].rows_before, steps[0].rows_after), (10, 6));

    for value in strings(&outcome.gold, "date_part").into_iter().flatten() {
        assert!(value.starts_with("2024-01-"), "unexpected date {}", value);
    }
}

#[test]
fn test_empty_window_writes_null_limits() {
    let (pipeline, store) = memory_pipeline(config_for(date(2024, 3, 1), date(2024, 3, 31)));

    let err = pipeline.make_dataset(load_raw()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset(_)));

    let limits: DateLimits = store.get_json(Artifact::DateLimits).unwrap();
    assert_eq!(limits, DateLimits::empty());
    assert!(!store.contains(Artifact::GoldData));
}

#[test]
fn test_cleaning_keeps_labelled_signup_rows_in_order() {
    let (pipeline, _) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();
    let gold = &outcome.gold;

    // L005 has no label, L007 comes from another source
    assert_eq!(
        strings(gold, "lead_id"),
        vec![
            Some("L003".to_string()),
            Some("L004".to_string()),
            Some("L006".to_string()),
            Some("L008".to_string()),
        ]
    );
    for source in strings(gold, "source") {
        assert_eq!(source.as_deref(), Some("signup"));
    }
    assert_eq!(gold.column("lead_indicator").unwrap().null_count(), 0);
}

#[test]
fn test_imputation_uses_mean_and_mode() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();

    let values: ImputationValues = store.get_json(Artifact::ImputationValues).unwrap();
    assert_eq!(values.numeric_policy, NumericImputation::Mean);
    // [1.0, 2.0, missing, 3.0]
    assert_eq!(values.continuous["time_spent"], 2.0);
    // [1, 1, 2, missing]
    assert_eq!(values.categorical["customer_group"], "1");
    // two of four leads have no customer code
    assert_eq!(values.categorical["customer_code"], "None");

    for column in outcome.gold.get_columns() {
        if column.name().as_str() == "bin_source" {
            continue;
        }
        assert_eq!(column.null_count(), 0, "nulls left in {}", column.name());
    }
    assert_eq!(
        strings(&outcome.gold, "customer_code"),
        vec![
            Some("C1".to_string()),
            Some("None".to_string()),
            Some("None".to_string()),
            Some("C8".to_string()),
        ]
    );
}

#[test]
fn test_scaled_values_within_unit_interval() {
    let (pipeline, _) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();

    let time = floats(&outcome.gold, "time_spent");
    assert_eq!(time, vec![Some(0.0), Some(0.5), Some(0.5), Some(1.0)]);
    for value in time.into_iter().flatten() {
        assert!((0.0..=1.0).contains(&value));
    }
}

#[test]
fn test_median_policy() {
    let config = PipelineConfig::builder()
        .min_date(date(2024, 1, 1))
        .max_date(date(2024, 1, 31))
        .numeric_imputation(NumericImputation::Median)
        .build()
        .unwrap();
    let (pipeline, store) = memory_pipeline(config);
    pipeline.make_dataset(load_raw()).unwrap();

    let values: ImputationValues = store.get_json(Artifact::ImputationValues).unwrap();
    assert_eq!(values.numeric_policy, NumericImputation::Median);
    assert_eq!(values.continuous["time_spent"], 2.0);
}

#[test]
fn test_snapshot_lists_processed_columns() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();

    let snapshot: Vec<String> = store.get_json(Artifact::ColumnsDrift).unwrap();
    let training = store.get_frame(Artifact::TrainingData).unwrap();

    assert_eq!(snapshot, column_names(&training));
    assert!(!snapshot.contains(&"domain".to_string()));
    assert!(!snapshot.contains(&"bin_source".to_string()));
    assert_eq!(
        column_names(&outcome.gold).last().map(String::as_str),
        Some("bin_source")
    );
}

#[test]
fn test_progress_and_cancellation() {
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let store = Arc::new(MemoryArtifactStore::new());
    let pipeline = Pipeline::builder()
        .config(january())
        .artifact_store(store)
        .on_progress(move |update| sink.lock().push(update))
        .build()
        .unwrap();

    pipeline.make_dataset(load_raw()).unwrap();
    let stages: Vec<PipelineStage> = updates.lock().iter().map(|u| u.stage).collect();
    assert!(stages.contains(&PipelineStage::Scaling));
    assert_eq!(stages.last(), Some(&PipelineStage::Complete));

    let token = CancellationToken::new();
    token.cancel();
    let cancelled = Pipeline::builder()
        .config(january())
        .artifact_store(Arc::new(MemoryArtifactStore::new()))
        .cancellation_token(token)
        .build()
        .unwrap();
    assert!(cancelled.make_dataset(load_raw()).unwrap_err().is_cancelled());
}

// ============================================================================
// Feature Stage
// ============================================================================

#[test]
fn test_features_are_float_without_identifiers() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();
    let features = pipeline.build_features(outcome.gold).unwrap();

    let names = column_names(&features.frame);
    for identifier in ["lead_id", "customer_code", "date_part"] {
        assert!(!names.contains(&identifier.to_string()));
    }
    for column in features.frame.get_columns() {
        assert_eq!(column.dtype(), &DataType::Float64);
    }
    assert_eq!(features.frame.height(), 4);
    assert_eq!(&names[..2], &["lead_indicator".to_string(), "time_spent".to_string()]);
    assert!(names.contains(&"customer_group_2".to_string()));

    let stored: FeatureColumns = store.get_json(Artifact::FeatureColumns).unwrap();
    assert_eq!(stored, features.columns);
}

#[test]
fn test_unmapped_sources_follow_policy() {
    // a grouping map that does not cover the signup source
    let mut schema = LeadSchema::default();
    schema.source_groups.retain(|g| g.source != "signup");

    for (policy, expected) in [
        (UnmappedSourcePolicy::Missing, None),
        (UnmappedSourcePolicy::Others, Some("Others")),
    ] {
        let config = PipelineConfig::builder()
            .min_date(date(2024, 1, 1))
            .max_date(date(2024, 1, 31))
            .unmapped_source_policy(policy)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .schema(schema.clone())
            .artifact_store(Arc::new(MemoryArtifactStore::new()))
            .build()
            .unwrap();

        let outcome = pipeline.make_dataset(load_raw()).unwrap();
        for group in strings(&outcome.gold, "bin_source") {
            assert_eq!(group.as_deref(), expected, "policy {:?}", policy);
        }
    }
}

// ============================================================================
// Filesystem Store and Inference
// ============================================================================

#[test]
fn test_filesystem_round_trip_and_inference() {
    let dir = TempDir::new().unwrap();
    let artifacts = dir.path().join("artifacts");

    // dataset stage, as the CLI runs it
    let config = PipelineConfig::builder()
        .min_date(date(2024, 1, 1))
        .max_date(date(2024, 1, 31))
        .artifact_dir(&artifacts)
        .build()
        .unwrap();
    let outcome = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .make_dataset(load_raw())
        .unwrap();
    assert_eq!(outcome.summary.artifacts_written.len(), 8);
    for artifact in &outcome.summary.artifacts_written {
        assert!(artifacts.join(artifact.file_name()).exists());
    }

    // feature stage from the gold file on disk, with a fresh store
    let gold = read_csv(artifacts.join(Artifact::GoldData.file_name())).unwrap();
    let config = PipelineConfig::builder()
        .artifact_dir(&artifacts)
        .build()
        .unwrap();
    let mut features = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .build_features(gold)
        .unwrap();
    let feature_path = dir.path().join("features.csv");
    write_csv(&mut features.frame, &feature_path).unwrap();
    assert_eq!(read_csv(&feature_path).unwrap().shape(), features.frame.shape());

    // inference on the whole export: no date or source filtering
    let store = FsArtifactStore::new(&artifacts).unwrap();
    assert!(store.contains(Artifact::FeatureColumns));
    let bundle = ArtifactBundle::load(&store).unwrap();
    let raw = load_raw().drop("lead_indicator").unwrap();
    let batch = InferencePreparer::new(bundle, LeadSchema::default(), UnmappedSourcePolicy::Others)
        .prepare(raw)
        .unwrap();

    assert_eq!(batch.features.height(), 10);
    assert_eq!(
        column_names(&batch.features),
        features.columns.without("lead_indicator").as_slice()
    );
    assert!(batch.labels.is_none());
    assert_eq!(batch.lead_ids.len(), 10);

    // scaler replayed from training: min 1.0, max 3.0
    let time = floats(&batch.features, "time_spent");
    assert_eq!(time[0], Some(1.5));
    assert_eq!(time[5], Some(0.5));

    assert!(read_optional_csv(dir.path().join("y_test.csv")).unwrap().is_none());
}

#[test]
fn test_inference_on_single_records_uses_training_levels() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();
    let features = pipeline.build_features(outcome.gold).unwrap();
    assert_eq!(
        features.columns.as_slice(),
        &["lead_indicator", "time_spent", "customer_group_2", "onboarding_True"]
    );

    let bundle = ArtifactBundle::load(store.as_ref()).unwrap();
    let preparer = InferencePreparer::new(bundle, LeadSchema::default(), UnmappedSourcePolicy::Missing);

    // L006: group 2, not onboarded
    let batch = preparer.prepare(load_raw().slice(5, 1)).unwrap();
    assert_eq!(string_values(&batch.lead_ids).unwrap(), vec![Some("L006".to_string())]);
    assert_eq!(floats(&batch.features, "customer_group_2"), vec![Some(1.0)]);
    assert_eq!(floats(&batch.features, "onboarding_True"), vec![Some(0.0)]);

    // L007: group 13 was never seen, onboarded
    let batch = preparer.prepare(load_raw().slice(6, 1)).unwrap();
    assert_eq!(floats(&batch.features, "customer_group_2"), vec![Some(0.0)]);
    assert_eq!(floats(&batch.features, "onboarding_True"), vec![Some(1.0)]);

    // the whole export: same indicators as the raw values
    let batch = preparer.prepare(load_raw()).unwrap();
    assert_eq!(
        floats(&batch.features, "onboarding_True"),
        [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0].map(Some).to_vec()
    );
    assert_eq!(
        floats(&batch.features, "customer_group_2"),
        [0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0].map(Some).to_vec()
    );
}

#[test]
fn test_inference_rejects_drifted_columns() {
    let (pipeline, store) = memory_pipeline(january());
    let outcome = pipeline.make_dataset(load_raw()).unwrap();
    pipeline.build_features(outcome.gold).unwrap();

    let bundle = ArtifactBundle::load(store.as_ref()).unwrap();
    let raw = load_raw().drop("time_spent").unwrap();
    let err = InferencePreparer::new(bundle, LeadSchema::default(), UnmappedSourcePolicy::Missing)
        .prepare(raw)
        .unwrap_err();

    match err {
        PipelineError::SchemaDrift {
            missing,
            unexpected,
        } => {
            assert_eq!(missing, vec!["time_spent".to_string()]);
            assert!(unexpected.is_empty());
        }
        other => panic!("expected drift, got {other}"),
    }
}

#[test]
fn test_inference_without_artifacts() {
    let dir = TempDir::new().unwrap();
    let store = FsArtifactStore::new(dir.path()).unwrap();
    let err = ArtifactBundle::load(&store).unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");
}
