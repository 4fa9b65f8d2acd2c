//! Enrichment: the pure transform between reading and writing.
//!
//! An [`Enricher`] turns one raw record into one enriched record. The
//! [`EnrichStage`] lifts it to whole batches with all-or-nothing semantics:
//! either every record of a batch is enriched, in order, or the batch fails
//! with the identifier of a record that could not be.

use crate::batch::{Batch, Message, Record};
use crate::error::{PipelineError, Result};
use rayon::prelude::*;
use std::marker::PhantomData;

/// Per-record business logic. Must not keep state between calls.
pub trait Enricher: Send + Sync {
    type Input: Record + Send + Sync;
    type Output: Send;

    /// # Errors
    /// Any error fails the whole batch containing `record`.
    fn enrich(&self, record: &Self::Input) -> anyhow::Result<Self::Output>;
}

/// [`Enricher`] backed by a closure.
pub struct FnEnricher<I, O, F> {
    f: F,
    _t: PhantomData<fn(&I) -> O>,
}

/// Wrap a closure as an [`Enricher`].
pub fn enrich_fn<I, O, F>(f: F) -> FnEnricher<I, O, F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    FnEnricher { f, _t: PhantomData }
}

impl<I, O, F> Enricher for FnEnricher<I, O, F>
where
    I: Record + Send + Sync,
    O: Send,
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn enrich(&self, record: &I) -> anyhow::Result<O> {
        (self.f)(record)
    }
}

/// Batch adapter around an [`Enricher`].
///
/// With more than one thread, the records of a batch are mapped on a
/// private rayon pool. Output order always equals input order; when several
/// records fail the reported one is not necessarily the earliest.
pub struct EnrichStage<E> {
    enricher: E,
    pool: Option<rayon::ThreadPool>,
}

impl<E: Enricher> EnrichStage<E> {
    /// Sequential stage.
    pub fn new(enricher: E) -> Self {
        Self {
            enricher,
            pool: None,
        }
    }

    /// Stage mapping each batch on `threads` workers.
    ///
    /// # Errors
    /// [`PipelineError::InvalidConfig`] for zero threads or if the pool
    /// cannot be built.
    pub fn with_threads(enricher: E, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "enrich threads must be at least 1".into(),
            ));
        }
        if threads == 1 {
            return Ok(Self::new(enricher));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("enrich-{i}"))
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("enrich pool: {e}")))?;
        Ok(Self {
            enricher,
            pool: Some(pool),
        })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, rayon::ThreadPool::current_num_threads)
    }

    #[must_use]
    pub fn enricher(&self) -> &E {
        &self.enricher
    }

    /// Enrich one batch.
    ///
    /// # Errors
    /// [`PipelineError::Enrichment`] naming the failing record; nothing of the
    /// batch is emitted in that case.
    pub fn enrich_batch(&self, batch: &Batch<E::Input>) -> Result<Batch<E::Output>> {
        let one = |r: &E::Input| {
            self.enricher
                .enrich(r)
                .map_err(|e| PipelineError::Enrichment {
                    record_id: r.record_id().to_string(),
                    reason: format!("{e:#}"),
                })
        };
        let out = match &self.pool {
            Some(pool) => pool.install(|| {
                batch
                    .records()
                    .par_iter()
                    .map(one)
                    .collect::<Result<Vec<_>>>()
            })?,
            None => batch.records().iter().map(one).collect::<Result<Vec<_>>>()?,
        };
        Ok(batch.with_records(out))
    }

    /// Enrich a queue message; the end-of-stream marker passes through unchanged.
    ///
    /// # Errors
    /// See [`EnrichStage::enrich_batch`].
    pub fn enrich(&self, message: Message<E::Input>) -> Result<Message<E::Output>> {
        match message {
            Message::Batch(batch) => self.enrich_batch(&batch).map(Message::Batch),
            Message::EndOfStream => Ok(Message::EndOfStream),
        }
    }
}
