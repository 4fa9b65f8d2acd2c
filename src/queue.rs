//! Fixed-capacity FIFO queue between two pipeline stages.
//!
//! [`BoundedQueue`] blocks on `put` while full and on `take` while empty.
//! Both operations also wake up when the queue's [`Shutdown`] fires, so a
//! stage whose peer has died is never left parked forever. Several queues
//! may share one `Shutdown`; the orchestrator does this so that a single
//! abort releases every worker of a file run.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use std::sync::{Arc, Mutex};

/// Returned by queue operations once the queue has been shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl std::fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue closed")
    }
}

impl std::error::Error for QueueClosed {}

/// One-shot broadcast used to close queues.
///
/// Nothing is ever sent on the inner channel; dropping the only sender
/// disconnects it, and every `select!` waiting on the receiver wakes up.
#[derive(Clone)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Fire the signal. Idempotent.
    pub fn fire(&self) {
        let mut lock = match self.trigger.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        lock.take();
    }

    #[must_use]
    pub fn is_fired(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded blocking queue, single producer and single consumer.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    shutdown: Shutdown,
}

impl<T> BoundedQueue<T> {
    /// A queue with its own shutdown signal.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_shutdown(capacity, Shutdown::new())
    }

    /// A queue closed by `shutdown`, which may be shared with other queues.
    ///
    /// # Panics
    /// Panics if `capacity` is 0; a zero-capacity channel would be a
    /// rendezvous point rather than a buffer.
    #[must_use]
    pub fn with_shutdown(capacity: usize, shutdown: Shutdown) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, shutdown }
    }

    /// Append `item`, blocking while the queue is full.
    ///
    /// # Errors
    /// [`QueueClosed`] if the queue is or becomes closed before the item is
    /// accepted. The item is dropped in that case.
    pub fn put(&self, item: T) -> Result<(), QueueClosed> {
        if self.shutdown.is_fired() {
            return Err(QueueClosed);
        }
        select! {
            send(self.tx, item) -> res => res.map_err(|_| QueueClosed),
            recv(self.shutdown.signal()) -> _ => Err(QueueClosed),
        }
    }

    /// Remove the oldest item, blocking while the queue is empty.
    ///
    /// # Errors
    /// [`QueueClosed`] once the queue is closed, even if items remain.
    pub fn take(&self) -> Result<T, QueueClosed> {
        if self.shutdown.is_fired() {
            return Err(QueueClosed);
        }
        select! {
            recv(self.rx) -> res => res.map_err(|_| QueueClosed),
            recv(self.shutdown.signal()) -> _ => Err(QueueClosed),
        }
    }

    /// Close the queue, waking every blocked `put` and `take`.
    pub fn close(&self) {
        self.shutdown.fire();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_fired()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// Discard whatever is still buffered, returning how many items were dropped.
    ///
    /// Works on a closed queue.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let q = BoundedQueue::new(3);
        assert_eq!(q.capacity(), 3);
        for i in 0..3 {
            q.put(i).unwrap();
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.take().unwrap(), 0);
        assert_eq!(q.take().unwrap(), 1);
        assert_eq!(q.take().unwrap(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn close_wakes_blocked_take() {
        let q = BoundedQueue::<u32>::new(1);
        thread::scope(|s| {
            let h = s.spawn(|| q.take());
            thread::sleep(Duration::from_millis(20));
            q.close();
            assert_eq!(h.join().unwrap(), Err(QueueClosed));
        });
    }

    #[test]
    fn close_wakes_blocked_put() {
        let q = BoundedQueue::new(1);
        q.put(1u32).unwrap();
        thread::scope(|s| {
            let h = s.spawn(|| q.put(2));
            thread::sleep(Duration::from_millis(20));
            q.close();
            assert_eq!(h.join().unwrap(), Err(QueueClosed));
        });
        assert_eq!(q.drain(), 1);
    }

    #[test]
    fn shared_shutdown_closes_all_queues() {
        let shutdown = Shutdown::new();
        let a = BoundedQueue::<u8>::with_shutdown(2, shutdown.clone());
        let b = BoundedQueue::<u8>::with_shutdown(2, shutdown.clone());
        a.put(1).unwrap();
        shutdown.fire();
        shutdown.fire();
        assert!(a.is_closed() && b.is_closed());
        assert_eq!(a.take(), Err(QueueClosed));
        assert_eq!(b.put(1), Err(QueueClosed));
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_rejected() {
        let _ = BoundedQueue::<u8>::new(0);
    }
}
