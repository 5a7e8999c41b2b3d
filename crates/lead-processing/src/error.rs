//! Error types for the lead preparation pipeline.
//!
//! Errors fall into a few families: schema errors (a column the pipeline
//! relies on is absent, or a filter leaves nothing to train on), artifact
//! errors (a persisted side file is missing or unreadable), drift errors
//! (inference-time columns disagree with the training snapshot) and
//! deployment errors raised by the registry wait.
//!
//! Errors are serializable so a caller can forward them as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the lead preparation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline was cancelled through its token.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A filter step left no rows to work with.
    #[error("Dataset is empty after {0}")]
    EmptyDataset(String),

    /// A date value could not be parsed.
    #[error("Invalid date '{value}' in column '{column}'")]
    InvalidDate { column: String, value: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// A required artifact is absent from the store.
    #[error("Artifact '{0}' not found")]
    ArtifactNotFound(String),

    /// An artifact was written twice within one run.
    #[error("Artifact '{0}' was already written in this run")]
    ArtifactAlreadyWritten(String),

    /// An artifact exists but its content could not be decoded.
    #[error("Artifact '{name}' is corrupt: {reason}")]
    ArtifactCorrupt { name: String, reason: String },

    /// Column set differs from the persisted schema snapshot.
    #[error("Schema drift detected: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaDrift {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// The registry has no versions for the requested model.
    #[error("No versions found for model '{0}'")]
    NoModelVersions(String),

    /// The model version did not reach the target stage in time.
    #[error("Model '{model}' version {version} did not reach stage '{stage}' after {attempts} attempts")]
    DeploymentTimeout {
        model: String,
        version: u64,
        stage: String,
        attempts: u32,
    },

    /// Registry backend failure.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::EmptyDataset(_) => "EMPTY_DATASET",
            Self::InvalidDate { .. } => "INVALID_DATE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            Self::ArtifactAlreadyWritten(_) => "ARTIFACT_ALREADY_WRITTEN",
            Self::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            Self::SchemaDrift { .. } => "SCHEMA_DRIFT",
            Self::NoModelVersions(_) => "NO_MODEL_VERSIONS",
            Self::DeploymentTimeout { .. } => "DEPLOYMENT_TIMEOUT",
            Self::Registry(_) => "REGISTRY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is a schema error (absent column, empty filter result, bad date).
    pub fn is_schema_error(&self) -> bool {
        match self {
            Self::ColumnNotFound(_) | Self::EmptyDataset(_) | Self::InvalidDate { .. } => true,
            Self::WithContext { source, .. } => source.is_schema_error(),
            _ => false,
        }
    }

    /// Check if this error means a required artifact was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ArtifactNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
