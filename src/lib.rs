//! # Ingestbeam
//!
//! A **bounded-memory ingestion pipeline** for large delimited record files.
//! Each input file is streamed through three concurrent stages: a reader
//! decoding fixed-size batches, an enricher deriving new fields, and a writer
//! appending to one consolidated output. The stages are connected by bounded
//! queues, so at most a handful of batches are ever held in memory no matter
//! how large the inputs are.
//!
//! ## Key Features
//!
//! - **Backpressure** - a slow writer stalls the reader instead of growing memory
//! - **Ordered output** - records come out in input order, files in configured order
//! - **Fail-fast** - the first failing stage aborts the file run and every worker is joined
//! - **Typed records** - rows are decoded with Serde into your own structs
//! - **Parallel enrichment** - optionally map the records of a batch on a rayon pool
//! - **Compressed I/O** - gzip, zstd, bzip2 and xz are detected transparently
//!
//! ## Quick Start
//!
//! ```no_run
//! use ingestbeam::*;
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(
//!     EnrichStage::with_threads(AccidentEnricher::default(), 4)?,
//!     PipelineOptions::default(),
//! )?;
//!
//! let inputs = vec![
//!     PathBuf::from("data/DfTRoadSafety_Accidents_2010.csv"),
//!     PathBuf::from("data/DfTRoadSafety_Accidents_2011.csv.gz"),
//! ];
//! let report = pipeline.run_csv(
//!     &inputs,
//!     Path::new("target/consolidated.csv"),
//!     CsvFormat::default(),
//!     CsvFormat::default(),
//! )?;
//! println!("{} records", report.total_records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Batches and the end-of-stream marker
//!
//! A [`Batch<T>`] is a non-empty, sequence-numbered chunk of records. Queues
//! carry [`Message<T>`], which is either a batch or
//! [`Message::EndOfStream`]; the marker is the only way a stage learns that
//! its input is complete.
//!
//! ### Stages
//!
//! - [`BatchSource`] - yields batches, then the marker (forever after)
//! - [`Enricher`] - pure per-record transform, lifted to batches by [`EnrichStage`]
//! - [`BatchSink`] - appends batches; shared by every file of a run
//!
//! CSV implementations are provided ([`CsvBatchSource`], [`CsvBatchSink`]);
//! anything else plugs in through the traits.
//!
//! ### Run lifecycle
//!
//! Every file gets a fresh [`RunControl`] moving through
//! `Running -> Draining -> Terminated`, or into `Aborting` on the first
//! failure. Aborting fires a shutdown signal that closes both queues, which
//! unblocks every worker. Failures surface as [`PipelineError::Run`] naming
//! the file and the [`Stage`].
//!
//! ## Custom enrichment
//!
//! ```
//! use ingestbeam::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Reading { id: String, celsius: f64 }
//!
//! impl Record for Reading {
//!     fn record_id(&self) -> &str { &self.id }
//! }
//!
//! let stage = EnrichStage::new(enrich_fn(|r: &Reading| {
//!     anyhow::ensure!(r.celsius > -273.15, "below absolute zero");
//!     Ok(r.celsius * 9.0 / 5.0 + 32.0)
//! }));
//! let batch = Batch::new(0, vec![Reading { id: "r1".into(), celsius: 100.0 }]).unwrap();
//! let out = stage.enrich_batch(&batch).unwrap();
//! assert_eq!(out.records(), &[212.0]);
//! ```
//!
//! ## Feature Flags
//!
//! - `compression-gzip` - `.gz` inputs and outputs
//! - `compression-zstd` - `.zst` inputs and outputs
//! - `compression-bzip2` - `.bz2` inputs and outputs
//! - `compression-xz` - `.xz` inputs and outputs
//!
//! All are enabled by default.
//!
//! ## Module Overview
//!
//! - [`pipeline`] - the orchestrator and its reports
//! - [`queue`] / [`run_state`] - bounded queues, shutdown signal, run state machine
//! - [`source`] / [`enrich`] / [`sink`] - the three stage contracts
//! - [`accident`] / [`query`] - the road-accident domain
//! - [`io`] - CSV helpers, compression, glob expansion
//! - [`config`] / [`logging`] - what the binary is built from
//! - [`testing`] - fixtures and in-memory doubles

pub mod accident;
pub mod batch;
pub mod config;
pub mod enrich;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod run_state;
pub mod sink;
pub mod source;
pub mod testing;

pub use accident::{AccidentEnricher, RoadAccident, RoadAccidentDetails, Severity, TimeOfDay};
pub use batch::{Batch, Message, Record};
pub use config::RunConfig;
pub use enrich::{EnrichStage, Enricher, enrich_fn};
pub use error::{PipelineError, Stage};
pub use io::csv::{CsvFormat, read_csv_vec, write_csv_vec};
pub use io::glob::expand_inputs;
pub use pipeline::{FileReport, Pipeline, PipelineOptions, RunReport};
pub use query::{AccidentQueries, load_accidents};
pub use queue::{BoundedQueue, QueueClosed, Shutdown};
pub use run_state::{RunControl, RunState, StageFailure};
pub use sink::{BatchSink, CsvBatchSink};
pub use source::{BatchSource, CsvBatchSource};
