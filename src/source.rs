//! Batch sources: the reader end of the pipeline.

use crate::batch::{Batch, Message};
use crate::error::{PipelineError, Result};
use crate::io::compression::{DynReader, auto_detect_reader};
use crate::io::csv::CsvFormat;
use csv::StringRecord;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Produces the batches of one input, then the end-of-stream marker.
///
/// Once [`Message::EndOfStream`] has been returned every further call
/// returns it again. The underlying resource is released on drop.
pub trait BatchSource: Send {
    type Item: Send;

    /// # Errors
    /// A row that cannot be decoded fails the read with
    /// [`PipelineError::MalformedRecord`].
    fn next_batch(&mut self) -> Result<Message<Self::Item>>;
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    type Item = S::Item;

    fn next_batch(&mut self) -> Result<Message<Self::Item>> {
        (**self).next_batch()
    }
}

/// Streams a delimited file as typed batches of at most `batch_size` rows.
///
/// Rows are decoded with Serde; with headers enabled, columns are matched by
/// header name and the header row itself is never emitted.
pub struct CsvBatchSource<T> {
    path: PathBuf,
    reader: csv::Reader<DynReader>,
    headers: Option<StringRecord>,
    batch_size: usize,
    rows_read: u64,
    next_seq: u64,
    exhausted: bool,
    _t: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> CsvBatchSource<T> {
    /// Open `path` for batched reading. Compressed inputs are detected.
    ///
    /// # Errors
    /// [`PipelineError::InvalidConfig`] for a zero batch size,
    /// [`PipelineError::Open`] if the file cannot be opened, and
    /// [`PipelineError::MalformedRecord`] if the header row is unreadable.
    pub fn open(path: impl AsRef<Path>, batch_size: usize, format: CsvFormat) -> Result<Self> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let open_err = |source| PipelineError::Open {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(open_err)?;
        let rdr = auto_detect_reader(file, &path).map_err(open_err)?;
        let mut reader = format.reader(rdr);

        let headers = if format.has_headers {
            let h = reader.headers().map_err(|e| PipelineError::MalformedRecord {
                path: path.clone(),
                row: 0,
                message: format!("unreadable header: {e}"),
            })?;
            Some(h.clone())
        } else {
            None
        };

        Ok(Self {
            path,
            reader,
            headers,
            batch_size,
            rows_read: 0,
            next_seq: 0,
            exhausted: false,
            _t: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows decoded so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn malformed(&self, row: u64, err: &csv::Error) -> PipelineError {
        PipelineError::MalformedRecord {
            path: self.path.clone(),
            row,
            message: err.to_string(),
        }
    }
}

impl<T: DeserializeOwned + Send> BatchSource for CsvBatchSource<T> {
    type Item = T;

    fn next_batch(&mut self) -> Result<Message<T>> {
        if self.exhausted {
            return Ok(Message::EndOfStream);
        }

        let mut records = Vec::with_capacity(self.batch_size.min(4096));
        let mut row = StringRecord::new();
        while records.len() < self.batch_size {
            match self.reader.read_record(&mut row) {
                Ok(true) => {
                    let n = self.rows_read + 1;
                    let rec = row
                        .deserialize::<T>(self.headers.as_ref())
                        .map_err(|e| self.malformed(n, &e))?;
                    self.rows_read = n;
                    records.push(rec);
                }
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => return Err(self.malformed(self.rows_read + 1, &e)),
            }
        }

        match Batch::new(self.next_seq, records) {
            Some(batch) => {
                self.next_seq += 1;
                Ok(Message::Batch(batch))
            }
            None => Ok(Message::EndOfStream),
        }
    }
}
