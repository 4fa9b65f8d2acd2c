//! Batches and the end-of-stream marker.
//!
//! Stages never hand each other single records. Everything that crosses a
//! queue is a [`Message`]: either a non-empty [`Batch`] or
//! [`Message::EndOfStream`], which closes the stream for one file run.

/// A record that can be named in error reports.
pub trait Record {
    /// Stable identifier of this record (e.g. the accident index).
    fn record_id(&self) -> &str;
}

/// An ordered, non-empty group of records with a per-file sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    seq: u64,
    records: Vec<T>,
}

impl<T> Batch<T> {
    /// Build a batch, or `None` if `records` is empty.
    #[must_use]
    pub fn new(seq: u64, records: Vec<T>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { seq, records })
        }
    }

    /// Position of this batch within its file run, starting at 0.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `false` for every constructed batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[T] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    /// Replace the records while keeping the sequence number.
    ///
    /// Callers must keep the length; the enrich stage is the only user.
    pub(crate) fn with_records<U>(&self, records: Vec<U>) -> Batch<U> {
        debug_assert_eq!(records.len(), self.records.len());
        Batch {
            seq: self.seq,
            records,
        }
    }
}

/// Unit of transfer on a pipeline queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    Batch(Batch<T>),
    /// No further batches follow on this queue for the current file.
    EndOfStream,
}

impl<T> Message<T> {
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Message::EndOfStream)
    }

    /// The carried batch, if this is not the marker.
    #[must_use]
    pub fn into_batch(self) -> Option<Batch<T>> {
        match self {
            Message::Batch(b) => Some(b),
            Message::EndOfStream => None,
        }
    }
}

impl<T> From<Batch<T>> for Message<T> {
    fn from(batch: Batch<T>) -> Self {
        Message::Batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_records_do_not_form_a_batch() {
        assert!(Batch::<u32>::new(0, vec![]).is_none());
        let b = Batch::new(3, vec![1, 2]).unwrap();
        assert_eq!(b.seq(), 3);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn marker_carries_no_batch() {
        let m: Message<u8> = Message::EndOfStream;
        assert!(m.is_end());
        assert!(m.into_batch().is_none());
        let m: Message<u8> = Batch::new(0, vec![7]).unwrap().into();
        assert!(!m.is_end());
        assert_eq!(m.into_batch().unwrap().into_records(), vec![7]);
    }
}
