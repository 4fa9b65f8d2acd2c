//! Batch sinks: the writer end of the pipeline.
//!
//! A sink is opened once per run and shared by every file of that run, so
//! that all enriched records accumulate in one destination.

use crate::batch::Batch;
use crate::error::{PipelineError, Result};
use crate::io::compression::{EncodedWriter, auto_detect_writer};
use crate::io::csv::{CsvFormat, ensure_parent};
use serde::Serialize;
use std::fs::File;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Appends batches to one destination in arrival order.
///
/// Never receives the end-of-stream marker; the orchestrator filters it.
pub trait BatchSink: Send {
    type Item: Send;

    /// # Errors
    /// [`PipelineError::IoWrite`] on any destination failure.
    fn write(&mut self, batch: &Batch<Self::Item>) -> Result<()>;

    /// Push buffered records to the destination.
    ///
    /// # Errors
    /// [`PipelineError::IoWrite`] if the destination rejects the data.
    fn flush(&mut self) -> Result<()>;
}

impl<S: BatchSink + ?Sized> BatchSink for &mut S {
    type Item = S::Item;

    fn write(&mut self, batch: &Batch<Self::Item>) -> Result<()> {
        (**self).write(batch)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Serde-backed delimited file sink.
///
/// The header (if enabled) is written once, before the first record of the
/// run. Output compression follows the file extension.
pub struct CsvBatchSink<T> {
    path: PathBuf,
    writer: csv::Writer<EncodedWriter>,
    rows_written: u64,
    _t: PhantomData<fn(T)>,
}

impl<T: Serialize> CsvBatchSink<T> {
    /// Create (or truncate) `path`, creating parent directories.
    ///
    /// # Errors
    /// [`PipelineError::Open`] if the destination cannot be created.
    pub fn open(path: impl AsRef<Path>, format: CsvFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| PipelineError::Open {
            path: path.clone(),
            source,
        };
        ensure_parent(&path).map_err(open_err)?;
        let file = File::create(&path).map_err(open_err)?;
        let w = auto_detect_writer(file, &path).map_err(open_err)?;
        Ok(Self {
            writer: format.writer(w),
            path,
            rows_written: 0,
            _t: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and close the destination, returning the total rows written.
    ///
    /// Compressed output gets its trailer here.
    ///
    /// # Errors
    /// [`PipelineError::IoWrite`] if flushing or closing the destination fails.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_rows()?;
        let rows = self.rows_written;
        let path = self.path.clone();
        let inner = self.writer.into_inner().map_err(|e| {
            let cause = e.error();
            write_err(&path, io::Error::new(cause.kind(), cause.to_string()))
        })?;
        inner.finish().map_err(|e| write_err(&path, e))?;
        Ok(rows)
    }
}

impl<T> CsvBatchSink<T> {
    fn flush_rows(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| write_err(&self.path, e))
    }

    fn io_err(&self, err: csv::Error) -> PipelineError {
        write_err(&self.path, err.into())
    }
}

fn write_err(path: &Path, source: io::Error) -> PipelineError {
    PipelineError::IoWrite {
        path: path.to_path_buf(),
        source,
    }
}

impl<T: Serialize + Send> BatchSink for CsvBatchSink<T> {
    type Item = T;

    fn write(&mut self, batch: &Batch<T>) -> Result<()> {
        for rec in batch.records() {
            self.writer.serialize(rec).map_err(|e| self.io_err(e))?;
            self.rows_written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_rows()
    }
}
