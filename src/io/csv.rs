//! Whole-file CSV helpers and the shared delimited-format settings.
//!
//! The pipeline itself streams through [`crate::source::CsvBatchSource`] and
//! [`crate::sink::CsvBatchSink`]. The helpers here load or store a complete
//! collection at once, for the query side and for preparing fixtures.

use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::Path;

/// Delimited-text dialect for inputs and the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    /// First row is a header and never reaches a batch.
    pub has_headers: bool,
    pub delimiter: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvFormat {
    pub(crate) fn reader<R: Read>(&self, rdr: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter)
            .from_reader(rdr)
    }

    pub(crate) fn writer<W: Write>(&self, w: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter)
            .from_writer(w)
    }
}

/// Make sure the parent directory of `path` exists.
pub(crate) fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }
    Ok(())
}

/// Read a delimited file into a typed `Vec<T>`.
///
/// Compressed files are detected by extension or magic bytes.
///
/// # Errors
/// Returns an error if the file cannot be opened or if any row fails to
/// deserialize into `T`; the message names the 1-based data row.
pub fn read_csv_vec<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    format: CsvFormat,
) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    let mut rdr = format.reader(rdr);
    let mut out = Vec::<T>::new();
    for (i, rec) in rdr.deserialize::<T>().enumerate() {
        let v = rec.with_context(|| format!("parse CSV record #{} of {}", i + 1, path.display()))?;
        out.push(v);
    }
    Ok(out)
}

/// Write a typed slice to a delimited file, creating parent directories.
///
/// # Returns
/// The number of rows written.
///
/// # Errors
/// Returns an error if the file/dirs cannot be created or any row fails to
/// serialize/flush.
pub fn write_csv_vec<T: Serialize>(
    path: impl AsRef<Path>,
    format: CsvFormat,
    data: &[T],
) -> Result<usize> {
    let path = path.as_ref();
    ensure_parent(path).with_context(|| format!("mkdir -p for {}", path.display()))?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let w = auto_detect_writer(f, path)
        .with_context(|| format!("setup compression for {}", path.display()))?;
    let mut wtr = format.writer(w);
    for (i, row) in data.iter().enumerate() {
        wtr.serialize(row)
            .with_context(|| format!("serialize CSV row #{}", i + 1))?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("flush {}: {}", path.display(), e.error()))?
        .finish()
        .with_context(|| format!("close {}", path.display()))?;
    Ok(data.len())
}
