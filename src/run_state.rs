//! Per-file run lifecycle shared by the three workers.
//!
//! `Running -> Draining -> Terminated` on the normal path,
//! `Running | Draining -> Aborting -> Terminated` on a fault.
//! The state lives in an atomic; the first failure is kept in a `OnceLock`
//! so later failures (usually peers reacting to the shutdown) cannot
//! overwrite it.

use crate::error::{PipelineError, Stage};
use crate::queue::Shutdown;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Running = 0,
    /// The reader has emitted the end-of-stream marker.
    Draining = 1,
    Aborting = 2,
    Terminated = 3,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Running,
            1 => RunState::Draining,
            2 => RunState::Aborting,
            _ => RunState::Terminated,
        }
    }
}

/// First failure of a run.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: PipelineError,
}

pub struct RunControl {
    state: AtomicU8,
    first_failure: OnceLock<StageFailure>,
    shutdown: Shutdown,
}

impl RunControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Running as u8),
            first_failure: OnceLock::new(),
            shutdown: Shutdown::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Signal that closes this run's queues on abort.
    #[must_use]
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn is_aborting(&self) -> bool {
        self.state() == RunState::Aborting
    }

    /// `Running -> Draining`. Returns `false` if the run was not `Running`.
    pub fn begin_draining(&self) -> bool {
        self.transition(|s| (s == RunState::Running).then_some(RunState::Draining))
    }

    /// Record `error` as the run's failure (if it is the first) and move to
    /// `Aborting`, closing every queue tied to this run.
    ///
    /// Shutdown errors are never recorded. Returns `true` if this call
    /// captured the first failure.
    pub fn abort(&self, stage: Stage, error: PipelineError) -> bool {
        let captured = !error.is_shutdown()
            && self.first_failure.set(StageFailure { stage, error }).is_ok();
        self.transition(|s| {
            matches!(s, RunState::Running | RunState::Draining).then_some(RunState::Aborting)
        });
        self.shutdown.fire();
        captured
    }

    /// Final transition once every worker has been joined.
    pub fn terminate(&self) {
        self.state.store(RunState::Terminated as u8, Ordering::Release);
    }

    /// Take the first failure out of a finished run.
    pub fn take_failure(&mut self) -> Option<StageFailure> {
        self.first_failure.take()
    }

    fn transition(&self, f: impl Fn(RunState) -> Option<RunState>) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                f(RunState::from_u8(cur)).map(|next| next as u8)
            })
            .is_ok()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
