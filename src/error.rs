//! Error types for the ingestion pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    Enrich,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Read => write!(f, "read"),
            Stage::Enrich => write!(f, "enrich"),
            Stage::Write => write!(f, "write"),
        }
    }
}

/// Main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed record in {} at row {row}: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        /// 1-based data row, header excluded.
        row: u64,
        message: String,
    },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("enrichment failed for record {record_id}: {reason}")]
    Enrichment { record_id: String, reason: String },

    #[error("write to {} failed: {source}", path.display())]
    IoWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker unwound because the run was aborting.
    #[error("pipeline shut down")]
    Shutdown,

    #[error("{stage} worker panicked")]
    WorkerPanicked { stage: Stage },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{stage} stage failed while processing {}: {source}", file.display())]
    Run {
        file: PathBuf,
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// `true` for the propagation-only shutdown variant.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PipelineError::Shutdown)
    }

    /// Stage recorded on a [`PipelineError::Run`] failure.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Run { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost cause, unwrapping a [`PipelineError::Run`].
    #[must_use]
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Run { source, .. } => source.root(),
            other => other,
        }
    }
}
