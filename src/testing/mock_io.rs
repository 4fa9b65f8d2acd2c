//! Mock I/O for exercising the pipeline without real inputs.
//!
//! - [`TempDirPath`] / [`mock_csv_file`] / [`read_csv_output`] for file-backed tests
//! - [`VecSource`] and [`MemorySink`] for in-memory runs with observable progress

use crate::batch::{Batch, Message};
use crate::error::{PipelineError, Result};
use crate::io::csv::{CsvFormat, write_csv_vec};
use crate::sink::BatchSink;
use crate::source::BatchSource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

/// A temporary directory that is deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path for `filename` within this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }
}

/// Write `data` as a delimited file named `filename` inside `dir`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn mock_csv_file<T: Serialize>(
    dir: &TempDirPath,
    filename: &str,
    data: &[T],
    format: CsvFormat,
) -> anyhow::Result<PathBuf> {
    let path = dir.file_path(filename);
    write_csv_vec(&path, format, data)?;
    Ok(path)
}

/// Read back a pipeline output for assertions. Headers are expected.
///
/// # Errors
/// Returns an error if the file cannot be read or a row does not decode.
pub fn read_csv_output<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<Vec<T>> {
    crate::io::csv::read_csv_vec(path, CsvFormat::default())
}

/// In-memory [`BatchSource`] chopping a vector into batches.
///
/// Optionally fails with [`PipelineError::MalformedRecord`] when it gets to
/// a given 1-based row, and counts the batches handed out so tests can
/// compare reader progress with writer progress.
pub struct VecSource<T> {
    pending: VecDeque<T>,
    batch_size: usize,
    next_seq: u64,
    rows: u64,
    fail_at_row: Option<u64>,
    produced: Arc<AtomicU64>,
    name: PathBuf,
}

impl<T> VecSource<T> {
    /// # Panics
    /// Panics if `batch_size` is 0.
    #[must_use]
    pub fn new(records: Vec<T>, batch_size: usize) -> Self {
        assert!(batch_size >= 1, "batch size must be at least 1");
        Self {
            pending: records.into(),
            batch_size,
            next_seq: 0,
            rows: 0,
            fail_at_row: None,
            produced: Arc::new(AtomicU64::new(0)),
            name: PathBuf::from("<memory>"),
        }
    }

    /// Fail instead of returning the batch that would contain `row`.
    #[must_use]
    pub fn fail_at_row(mut self, row: u64) -> Self {
        self.fail_at_row = Some(row);
        self
    }

    /// Name used in error reports.
    #[must_use]
    pub fn named(mut self, name: impl Into<PathBuf>) -> Self {
        self.name = name.into();
        self
    }

    /// Counter of data batches returned so far.
    #[must_use]
    pub fn produced(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.produced)
    }
}

impl<T: Send> BatchSource for VecSource<T> {
    type Item = T;

    fn next_batch(&mut self) -> Result<Message<T>> {
        let take = self.batch_size.min(self.pending.len());
        if let Some(row) = self.fail_at_row
            && row > self.rows
            && row <= self.rows + take as u64
        {
            return Err(PipelineError::MalformedRecord {
                path: self.name.clone(),
                row,
                message: "injected decode failure".into(),
            });
        }
        let records: Vec<T> = self.pending.drain(..take).collect();
        self.rows += take as u64;
        match Batch::new(self.next_seq, records) {
            Some(batch) => {
                self.next_seq += 1;
                self.produced.fetch_add(1, Ordering::SeqCst);
                Ok(Message::Batch(batch))
            }
            None => Ok(Message::EndOfStream),
        }
    }
}

struct MemorySinkState<T> {
    batches: Vec<Batch<T>>,
    flushes: u64,
    max_lag: u64,
}

/// In-memory [`BatchSink`]; clones share the same storage.
///
/// Can be slowed down, made to fail on the k-th write (0-based across the
/// sink's lifetime), and can watch a [`VecSource::produced`] counter to
/// record how far the reader ever got ahead of the writer.
pub struct MemorySink<T> {
    state: Arc<Mutex<MemorySinkState<T>>>,
    delay: Option<Duration>,
    fail_on_write: Option<u64>,
    writes: u64,
    watch: Option<Arc<AtomicU64>>,
}

impl<T> Clone for MemorySink<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            delay: self.delay,
            fail_on_write: self.fail_on_write,
            writes: self.writes,
            watch: self.watch.clone(),
        }
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemorySink<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemorySinkState {
                batches: Vec::new(),
                flushes: 0,
                max_lag: 0,
            })),
            delay: None,
            fail_on_write: None,
            writes: 0,
            watch: None,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn fail_on_write(mut self, k: u64) -> Self {
        self.fail_on_write = Some(k);
        self
    }

    #[must_use]
    pub fn watch_producer(mut self, produced: Arc<AtomicU64>) -> Self {
        self.watch = Some(produced);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemorySinkState<T>> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Sizes of the written batches, in write order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batches.iter().map(Batch::len).collect()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.lock().batches.iter().map(Batch::len).sum()
    }

    #[must_use]
    pub fn flushes(&self) -> u64 {
        self.lock().flushes
    }

    /// Largest observed `produced - written` at the start of a write.
    #[must_use]
    pub fn max_lag(&self) -> u64 {
        self.lock().max_lag
    }
}

impl<T: Clone> MemorySink<T> {
    /// All written records, in write order.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.lock()
            .batches
            .iter()
            .flat_map(|b| b.records().iter().cloned())
            .collect()
    }
}

impl<T: Clone + Send> BatchSink for MemorySink<T> {
    type Item = T;

    fn write(&mut self, batch: &Batch<T>) -> Result<()> {
        let k = self.writes;
        self.writes += 1;
        if let Some(produced) = &self.watch {
            let lag = produced.load(Ordering::SeqCst).saturating_sub(k);
            let mut st = self.lock();
            st.max_lag = st.max_lag.max(lag);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_on_write == Some(k) {
            return Err(PipelineError::IoWrite {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("injected write failure"),
            });
        }
        self.lock().batches.push(batch.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_source_batches_and_repeats_marker() -> anyhow::Result<()> {
        let mut src = VecSource::new((0..5).collect::<Vec<u32>>(), 2);
        let mut sizes = Vec::new();
        while let Some(b) = src.next_batch()?.into_batch() {
            sizes.push(b.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(src.next_batch()?.is_end());
        assert_eq!(src.produced().load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn vec_source_injected_failure_names_row() {
        let mut src = VecSource::new((0..10).collect::<Vec<u32>>(), 4).fail_at_row(6);
        assert!(src.next_batch().is_ok());
        match src.next_batch() {
            Err(PipelineError::MalformedRecord { row, .. }) => assert_eq!(row, 6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn memory_sink_clones_share_storage() -> anyhow::Result<()> {
        let sink = MemorySink::<u8>::new();
        let mut writer = sink.clone();
        writer.write(&Batch::new(0, vec![1, 2]).unwrap())?;
        writer.flush()?;
        assert_eq!(sink.records(), vec![1, 2]);
        assert_eq!(sink.flushes(), 1);
        Ok(())
    }
}
