//! CSV table writer
//!
//! The writer is a pure append sink: every [`BatchSink::append_batch`] call
//! opens the destination in append mode, writes its rows, flushes and closes
//! the file before returning. No state other than the path and a row counter
//! survives between calls.
//!
//! The header row is a once-per-file concern handled by
//! [`CsvTableWriter::create`], which also truncates any previous content.
//! Appends never write a header.

use crate::error::WriteError;
use crate::models::{InstrumentRecord, COLUMNS};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for flushed record batches.
pub trait BatchSink {
    /// Appends `records` in order. An empty slice must succeed without
    /// touching the destination. Not atomic: a failed call may have written
    /// part of its batch.
    fn append_batch(&mut self, records: &[InstrumentRecord]) -> Result<(), WriteError>;
}

#[derive(Debug)]
pub struct CsvTableWriter {
    path: PathBuf,
    rows_written: u64,
}

impl CsvTableWriter {
    /// Truncates (or creates) the table at `path`, writing the header row
    /// when `include_header` is set.
    pub fn create(path: impl Into<PathBuf>, include_header: bool) -> Result<Self, WriteError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(&path, e))?;
        }

        let file = File::create(&path).map_err(|e| io_error(&path, e))?;

        if include_header {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer
                .write_record(COLUMNS)
                .map_err(|e| csv_error(&path, e))?;
            writer.flush().map_err(|e| io_error(&path, e))?;
        }

        debug!(path = %path.display(), include_header, "table truncated");

        Ok(Self {
            path,
            rows_written: 0,
        })
    }

    /// Attaches to an existing table without modifying it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this writer.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl BatchSink for CsvTableWriter {
    fn append_batch(&mut self, records: &[InstrumentRecord]) -> Result<(), WriteError> {
        if records.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for record in records {
            writer
                .serialize(record)
                .map_err(|e| csv_error(&self.path, e))?;
        }
        writer.flush().map_err(|e| io_error(&self.path, e))?;

        self.rows_written += records.len() as u64;
        debug!(
            path = %self.path.display(),
            rows = records.len(),
            total = self.rows_written,
            "batch appended"
        );

        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> WriteError {
    WriteError::Csv {
        path: path.display().to_string(),
        source,
    }
}
