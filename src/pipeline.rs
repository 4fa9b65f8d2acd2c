//! The orchestrator: three concurrent workers per file, two bounded queues.
//!
//! ```text
//!  source --put--> [ queue A ] --take--> enrich --put--> [ queue B ] --take--> sink
//!  (reader worker)                (enrich worker)                   (write worker)
//! ```
//!
//! Every file gets fresh queues and a fresh [`RunControl`]; nothing of one
//! file's run survives into the next. The sink is the only thing shared
//! across files.
//!
//! Termination is driven by the end-of-stream marker: the reader puts it on
//! queue A, the enrich worker forwards it to queue B, the writer stops when
//! it sees it. On a fault the failing worker records the error and fires the
//! run's shutdown signal, which closes both queues and wakes every worker
//! blocked on them. The orchestrator joins all three workers before it
//! reports anything.

use crate::batch::Message;
use crate::enrich::{EnrichStage, Enricher};
use crate::error::{PipelineError, Result, Stage};
use crate::io::csv::CsvFormat;
use crate::queue::BoundedQueue;
use crate::run_state::{RunControl, StageFailure};
use crate::sink::{BatchSink, CsvBatchSink};
use crate::source::{BatchSource, CsvBatchSource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum records per batch.
    pub batch_size: usize,
    /// Slots in each of the two queues.
    pub queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineOptions {
    /// # Errors
    /// [`PipelineError::InvalidConfig`] if either value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one successful file run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub batches: u64,
    pub records_read: u64,
    pub records_written: u64,
    pub elapsed_ms: u64,
}

/// Outcome of a successful multi-file run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub total_records: u64,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Store the report as pretty-printed JSON.
    ///
    /// # Errors
    /// [`PipelineError::IoWrite`] if the file cannot be created or written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| PipelineError::IoWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut w = BufWriter::new(File::create(path).map_err(write_err)?);
        serde_json::to_writer_pretty(&mut w, self).map_err(|e| write_err(e.into()))?;
        w.write_all(b"\n").map_err(write_err)?;
        w.flush().map_err(write_err)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StageStats {
    batches: u64,
    records: u64,
}

pub struct Pipeline<E> {
    stage: EnrichStage<E>,
    options: PipelineOptions,
}

impl<E: Enricher> Pipeline<E> {
    /// # Errors
    /// [`PipelineError::InvalidConfig`] if `options` are invalid.
    pub fn new(stage: EnrichStage<E>, options: PipelineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { stage, options })
    }

    #[must_use]
    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    #[must_use]
    pub fn stage(&self) -> &EnrichStage<E> {
        &self.stage
    }

    /// Run every file in order, appending all output to `sink`.
    ///
    /// `open` is called for each file right before its run starts, so at
    /// most one input is open at a time. The first failing file ends the
    /// run; files before it stay written.
    ///
    /// # Errors
    /// [`PipelineError::Run`] naming the file and stage that failed.
    pub fn run_files<S, W, F>(
        &self,
        files: &[PathBuf],
        mut open: F,
        sink: &mut W,
    ) -> Result<RunReport>
    where
        S: BatchSource<Item = E::Input>,
        W: BatchSink<Item = E::Output>,
        F: FnMut(&Path) -> Result<S>,
    {
        let started = Instant::now();
        let mut report = RunReport::default();
        for (idx, file) in files.iter().enumerate() {
            info!(
                file = %file.display(),
                index = idx + 1,
                total = files.len(),
                "starting to process file"
            );
            let source = open(file).map_err(|e| PipelineError::Run {
                file: file.clone(),
                stage: Stage::Read,
                source: Box::new(e),
            })?;
            let file_report = self.run_file(file, source, sink)?;
            report.total_records += file_report.records_written;
            report.files.push(file_report);
        }
        report.elapsed_ms = elapsed_ms(started);
        info!(
            files = report.files.len(),
            records = report.total_records,
            elapsed_ms = report.elapsed_ms,
            "run complete"
        );
        Ok(report)
    }

    /// Run one file through the three stages and wait for all of them.
    ///
    /// The sink is flushed on both the success and the failure path but is
    /// not closed.
    ///
    /// # Errors
    /// [`PipelineError::Run`] carrying the first failure observed by any worker.
    pub fn run_file<S, W>(&self, file: &Path, source: S, sink: &mut W) -> Result<FileReport>
    where
        S: BatchSource<Item = E::Input>,
        W: BatchSink<Item = E::Output>,
    {
        let span = info_span!("file", path = %file.display());
        let _entered = span.enter();
        let started = Instant::now();

        let mut control = RunControl::new();
        let raw = BoundedQueue::with_shutdown(self.options.queue_capacity, control.shutdown());
        let enriched = BoundedQueue::with_shutdown(self.options.queue_capacity, control.shutdown());

        let (read, _, written) = {
            let (control, raw, enriched, stage) = (&control, &raw, &enriched, &self.stage);
            let sink = &mut *sink;
            thread::scope(|s| {
                let reader = {
                    let span = span.clone();
                    s.spawn(move || {
                        let _g = span.enter();
                        supervise(Stage::Read, control, || read_loop(source, raw, control))
                    })
                };
                let enricher = {
                    let span = span.clone();
                    s.spawn(move || {
                        let _g = span.enter();
                        supervise(Stage::Enrich, control, || enrich_loop(stage, raw, enriched))
                    })
                };
                let writer = {
                    let span = span.clone();
                    s.spawn(move || {
                        let _g = span.enter();
                        supervise(Stage::Write, control, || write_loop(enriched, sink))
                    })
                };
                (
                    reader.join().ok().flatten(),
                    enricher.join().ok().flatten(),
                    writer.join().ok().flatten(),
                )
            })
        };

        let leftover = raw.drain() + enriched.drain();
        if leftover > 0 {
            debug!(batches = leftover, "discarded queued batches after abort");
        }
        control.terminate();

        let flushed = sink.flush();
        let run_err = |stage: Stage, error: PipelineError| PipelineError::Run {
            file: file.to_path_buf(),
            stage,
            source: Box::new(error),
        };

        if let Some(StageFailure { stage, error }) = control.take_failure() {
            if let Err(flush_err) = flushed {
                warn!(error = %flush_err, "flush after aborted run failed");
            }
            warn!(%stage, "file run aborted");
            return Err(run_err(stage, error));
        }
        flushed.map_err(|e| run_err(Stage::Write, e))?;

        let (Some(read), Some(written)) = (read, written) else {
            return Err(run_err(Stage::Read, PipelineError::Shutdown));
        };
        debug_assert_eq!(read.records, written.records);

        let report = FileReport {
            path: file.to_path_buf(),
            batches: read.batches,
            records_read: read.records,
            records_written: written.records,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            batches = report.batches,
            records = report.records_written,
            elapsed_ms = report.elapsed_ms,
            "file processed"
        );
        Ok(report)
    }
}

impl<E> Pipeline<E>
where
    E: Enricher,
    E::Input: DeserializeOwned,
    E::Output: Serialize,
{
    /// Read every input as delimited text and write one delimited output.
    ///
    /// The output is opened once for the whole run and closed at the end,
    /// also when a file fails.
    ///
    /// # Errors
    /// Opening the output, any file run, or the final close.
    pub fn run_csv(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        input_format: CsvFormat,
        output_format: CsvFormat,
    ) -> Result<RunReport> {
        let mut sink = CsvBatchSink::<E::Output>::open(output, output_format)?;
        let batch_size = self.options.batch_size;
        let outcome = self.run_files(
            inputs,
            |path| CsvBatchSource::<E::Input>::open(path, batch_size, input_format),
            &mut sink,
        );
        match outcome {
            Ok(report) => {
                sink.finish()?;
                Ok(report)
            }
            Err(e) => {
                if let Err(close_err) = sink.finish() {
                    warn!(error = %close_err, "closing output after failed run");
                }
                Err(e)
            }
        }
    }
}

/// Run a worker body, turning its failure (or panic) into an abort.
fn supervise<T>(
    stage: Stage,
    control: &RunControl,
    body: impl FnOnce() -> Result<T>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            if err.is_shutdown() {
                debug!(%stage, "worker stopped on shutdown");
            } else {
                error!(%stage, error = %err, "stage failed");
            }
            control.abort(stage, err);
            None
        }
        Err(_) => {
            error!(%stage, "worker panicked");
            control.abort(stage, PipelineError::WorkerPanicked { stage });
            None
        }
    }
}

fn closed(_: crate::queue::QueueClosed) -> PipelineError {
    PipelineError::Shutdown
}

fn read_loop<S: BatchSource>(
    mut source: S,
    out: &BoundedQueue<Message<S::Item>>,
    control: &RunControl,
) -> Result<StageStats> {
    let mut stats = StageStats::default();
    loop {
        if control.is_aborting() {
            return Err(PipelineError::Shutdown);
        }
        let message = source.next_batch()?;
        let end = match &message {
            Message::Batch(batch) => {
                stats.batches += 1;
                stats.records += batch.len() as u64;
                debug!(seq = batch.seq(), records = batch.len(), "read batch");
                false
            }
            Message::EndOfStream => true,
        };
        out.put(message).map_err(closed)?;
        if end {
            control.begin_draining();
            debug!(batches = stats.batches, "reader reached end of input");
            return Ok(stats);
        }
    }
}

fn enrich_loop<E: Enricher>(
    stage: &EnrichStage<E>,
    input: &BoundedQueue<Message<E::Input>>,
    out: &BoundedQueue<Message<E::Output>>,
) -> Result<StageStats> {
    let mut stats = StageStats::default();
    loop {
        let enriched = stage.enrich(input.take().map_err(closed)?)?;
        let end = match &enriched {
            Message::Batch(batch) => {
                stats.batches += 1;
                stats.records += batch.len() as u64;
                debug!(seq = batch.seq(), records = batch.len(), "enriched batch");
                false
            }
            Message::EndOfStream => true,
        };
        out.put(enriched).map_err(closed)?;
        if end {
            return Ok(stats);
        }
    }
}

fn write_loop<W: BatchSink>(
    input: &BoundedQueue<Message<W::Item>>,
    sink: &mut W,
) -> Result<StageStats> {
    let mut stats = StageStats::default();
    loop {
        match input.take().map_err(closed)? {
            Message::EndOfStream => return Ok(stats),
            Message::Batch(batch) => {
                sink.write(&batch)?;
                stats.batches += 1;
                stats.records += batch.len() as u64;
                debug!(seq = batch.seq(), records = batch.len(), "wrote batch");
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
