//! CSV input and output for raw exports and feature tables.

use crate::error::{PipelineError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// Read a CSV file with a header row.
///
/// Schema inference scans the whole file so sparse columns are not typed from
/// their first few (possibly empty) rows.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    info!("Loaded {}: {:?}", path.display(), df.shape());
    Ok(df)
}

/// Read a CSV file that may legitimately be absent, such as a label file
/// for unlabelled inference data.
pub fn read_optional_csv(path: impl AsRef<Path>) -> Result<Option<DataFrame>> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("Optional file {} not present", path.display());
        return Ok(None);
    }
    read_csv(path).map(Some)
}

/// Write a frame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;

    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
