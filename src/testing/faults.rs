//! Fault injection around real stages.

use crate::batch::Record;
use crate::enrich::Enricher;
use anyhow::bail;
use std::collections::HashSet;

/// Delegates to `inner` but fails on the listed record ids.
pub struct FailingEnricher<E> {
    inner: E,
    ids: HashSet<String>,
}

impl<E> FailingEnricher<E> {
    pub fn new<I, S>(inner: E, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl<E: Enricher> Enricher for FailingEnricher<E> {
    type Input = E::Input;
    type Output = E::Output;

    fn enrich(&self, record: &E::Input) -> anyhow::Result<E::Output> {
        if self.ids.contains(record.record_id()) {
            bail!("injected enrichment failure");
        }
        self.inner.enrich(record)
    }
}

/// Delegates to `inner` but panics on one record id.
pub struct PanickingEnricher<E> {
    inner: E,
    id: String,
}

impl<E> PanickingEnricher<E> {
    pub fn new(inner: E, id: impl Into<String>) -> Self {
        Self {
            inner,
            id: id.into(),
        }
    }
}

impl<E: Enricher> Enricher for PanickingEnricher<E> {
    type Input = E::Input;
    type Output = E::Output;

    fn enrich(&self, record: &E::Input) -> anyhow::Result<E::Output> {
        assert!(record.record_id() != self.id, "injected enrichment panic");
        self.inner.enrich(record)
    }
}
