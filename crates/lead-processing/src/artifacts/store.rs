//! Artifact store implementations.

use super::Artifact;
use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Storage backend for pipeline artifacts.
///
/// Implementations enforce write-once semantics for the lifetime of the
/// store value: one pipeline run writes each artifact at most once.
pub trait ArtifactStore: Send + Sync {
    /// Persist the raw bytes of an artifact.
    fn put_bytes(&self, artifact: Artifact, bytes: &[u8]) -> Result<()>;

    /// Load the raw bytes of an artifact.
    ///
    /// Returns [`PipelineError::ArtifactNotFound`] when it was never written.
    fn get_bytes(&self, artifact: Artifact) -> Result<Vec<u8>>;

    /// Check whether the artifact exists.
    fn contains(&self, artifact: Artifact) -> bool;

    /// Human-readable location of the artifact, used in logs.
    fn location(&self, artifact: Artifact) -> String;
}

/// Typed helpers on top of [`ArtifactStore`].
pub trait ArtifactStoreExt: ArtifactStore {
    /// Serialize a value as pretty JSON.
    fn put_json<T: Serialize + ?Sized>(&self, artifact: Artifact, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put_bytes(artifact, &bytes)
    }

    /// Deserialize a JSON artifact.
    fn get_json<T: DeserializeOwned>(&self, artifact: Artifact) -> Result<T> {
        let bytes = self.get_bytes(artifact)?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::ArtifactCorrupt {
            name: artifact.file_name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Write a frame as CSV with a header row.
    fn put_frame(&self, artifact: Artifact, df: &DataFrame) -> Result<()> {
        let bytes = frame_to_csv(df)?;
        self.put_bytes(artifact, &bytes)
    }

    /// Read a CSV artifact back into a frame.
    fn get_frame(&self, artifact: Artifact) -> Result<DataFrame> {
        let bytes = self.get_bytes(artifact)?;
        csv_to_frame(bytes).map_err(|e| PipelineError::ArtifactCorrupt {
            name: artifact.file_name().to_string(),
            reason: e.to_string(),
        })
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStoreExt for S {}

/// Encode a frame as CSV bytes.
pub(crate) fn frame_to_csv(df: &DataFrame) -> Result<Vec<u8>> {
    let mut df = df.clone();
    let mut buf: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)?;
    Ok(buf)
}

/// Decode CSV bytes into a frame.
pub(crate) fn csv_to_frame(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
}

/// Records which artifacts a store has written, to reject rewrites.
#[derive(Debug, Default)]
struct WriteLedger {
    written: Mutex<HashSet<Artifact>>,
}

impl WriteLedger {
    fn claim(&self, artifact: Artifact) -> Result<()> {
        if !self.written.lock().insert(artifact) {
            return Err(PipelineError::ArtifactAlreadyWritten(
                artifact.file_name().to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Artifact store backed by a directory.
///
/// Concurrent runs against the same directory are not coordinated; callers
/// must run one training job per directory at a time.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    ledger: WriteLedger,
}

impl FsArtifactStore {
    /// Open (and create if needed) an artifact directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            info!("Created artifact directory: {}", root.display());
        }
        Ok(Self {
            root,
            ledger: WriteLedger::default(),
        })
    }

    /// Directory the store writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an artifact file.
    pub fn path_of(&self, artifact: Artifact) -> PathBuf {
        self.root.join(artifact.file_name())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put_bytes(&self, artifact: Artifact, bytes: &[u8]) -> Result<()> {
        self.ledger.claim(artifact)?;
        let path = self.path_of(artifact);
        fs::write(&path, bytes)?;
        info!("Artifact saved: {}", path.display());
        Ok(())
    }

    fn get_bytes(&self, artifact: Artifact) -> Result<Vec<u8>> {
        let path = self.path_of(artifact);
        if !path.exists() {
            return Err(PipelineError::ArtifactNotFound(
                path.to_string_lossy().to_string(),
            ));
        }
        debug!("Loading artifact: {}", path.display());
        Ok(fs::read(&path)?)
    }

    fn contains(&self, artifact: Artifact) -> bool {
        self.path_of(artifact).exists()
    }

    fn location(&self, artifact: Artifact) -> String {
        self.path_of(artifact).display().to_string()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Artifact store kept in memory; used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<HashMap<Artifact, Vec<u8>>>,
    ledger: WriteLedger,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact without claiming it in this run's ledger.
    ///
    /// Models artifacts left behind by an earlier run.
    pub fn preload(&self, artifact: Artifact, bytes: Vec<u8>) {
        self.entries.lock().insert(artifact, bytes);
    }

    /// Names of the stored artifacts, sorted.
    pub fn artifact_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.entries.lock().keys().map(|a| a.file_name()).collect();
        names.sort_unstable();
        names
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put_bytes(&self, artifact: Artifact, bytes: &[u8]) -> Result<()> {
        self.ledger.claim(artifact)?;
        self.entries.lock().insert(artifact, bytes.to_vec());
        debug!("Artifact stored in memory: {}", artifact);
        Ok(())
    }

    fn get_bytes(&self, artifact: Artifact) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .get(&artifact)
            .cloned()
            .ok_or_else(|| PipelineError::ArtifactNotFound(artifact.file_name().to_string()))
    }

    fn contains(&self, artifact: Artifact) -> bool {
        self.entries.lock().contains_key(&artifact)
    }

    fn location(&self, artifact: Artifact) -> String {
        format!("memory://{}", artifact.file_name())
    }
}
