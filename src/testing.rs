//! Testing utilities for ingestion pipelines.
//!
//! - **Fixtures**: deterministic accident records ([`sample_accidents`])
//! - **Mock I/O**: temp directories, CSV fixture files, in-memory
//!   [`VecSource`] / [`MemorySink`] with failure injection and progress tracking
//! - **Faults**: enricher wrappers that fail or panic on chosen records
//!
//! # Quick Start
//!
//! ```no_run
//! use ingestbeam::testing::*;
//! use ingestbeam::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(
//!     EnrichStage::new(AccidentEnricher::default()),
//!     PipelineOptions { batch_size: 10, queue_capacity: 2 },
//! )?;
//! let source = VecSource::new(sample_accidents(0, 25), 10);
//! let mut sink = MemorySink::new();
//! let report = pipeline.run_file(std::path::Path::new("memory.csv"), source, &mut sink)?;
//! assert_eq!(report.records_written, 25);
//! assert_eq!(sink.batch_sizes(), vec![10, 10, 5]);
//! # Ok(())
//! # }
//! ```

pub mod faults;
pub mod fixtures;
pub mod mock_io;

pub use faults::*;
pub use fixtures::*;
pub use mock_io::*;
