//! `DispatchQueue` (§4.6) — a bounded MPMC queue of [`LogMessage`].
//!
//! A design giving each producer its own dedicated lock-free SPSC ring,
//! fanning consumers out across all of them, exists to eliminate
//! producer-producer contention for a single dedicated consumer per ring.
//! §4.6's ordering guarantee is weaker ("across producers timestamps are
//! the only ordering guarantee") and needs true multi-consumer draining, so
//! here the per-producer rings collapse to one bounded ring behind the
//! crate's [`SpinLock`] — simpler, and a single FIFO trivially keeps each
//! producer's own messages in its own enqueue order, which is all §4.6
//! asks for.

use crate::error::LogCoreError;
use crate::handle::PayloadHandle;
use crate::invariants::debug_assert_queue_len_bounded;
use crate::selflog::SelfLog;
use crate::spinlock::SpinLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One dispatched log event: the disjointed payload head plus enough
/// metadata for a sink to decide whether to format it.
#[derive(Debug, Clone, Copy)]
pub struct LogMessage {
    pub payload: PayloadHandle,
    pub timestamp_ns: i64,
    pub level: u8,
    pub producer_id: usize,
}

struct Inner {
    slots: Vec<Option<LogMessage>>,
    head: usize,
    len: usize,
}

impl Inner {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Bounded MPMC queue backing a [`crate::LogController`].
pub struct DispatchQueue {
    inner: SpinLock<Inner>,
    next_producer_id: AtomicUsize,
}

/// Returned when [`DispatchQueue::enqueue`] cannot accept a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: SpinLock::new(Inner {
                slots: (0..capacity.max(1)).map(|_| None).collect(),
                head: 0,
                len: 0,
            }),
            next_producer_id: AtomicUsize::new(0),
        }
    }

    /// Assigns a stable producer id (used only to tag [`LogMessage::producer_id`];
    /// registration never blocks and never fails).
    pub fn register_producer(&self) -> usize {
        self.next_producer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Attempts to enqueue `msg`. On `Err`, the caller is responsible for
    /// force-releasing `msg.payload` and reporting the overflow to
    /// [`SelfLog`] (`release` happens at the [`crate::MemoryManager`] the
    /// payload was allocated from, which this queue does not own).
    pub fn enqueue(&self, msg: LogMessage) -> Result<(), EnqueueError> {
        let mut inner = self.inner.lock();
        if inner.len == inner.capacity() {
            return Err(EnqueueError::Full);
        }
        let tail = (inner.head + inner.len) % inner.capacity();
        inner.slots[tail] = Some(msg);
        inner.len += 1;
        debug_assert_queue_len_bounded!(inner.len, inner.capacity());
        Ok(())
    }

    /// Enqueues `msg`, force-releasing it through `manager` and reporting
    /// to `self_log` on overflow, per §4.6.
    pub fn enqueue_or_drop(
        &self,
        msg: LogMessage,
        manager: &crate::memory_manager::MemoryManager,
        self_log: &SelfLog,
    ) -> Result<(), EnqueueError> {
        match self.enqueue(msg) {
            Ok(()) => Ok(()),
            Err(EnqueueError::Full) => {
                manager.force_release_payloads(&[msg.payload]);
                self_log.report(LogCoreError::FailedToAllocatePayloadBecauseOfItsSize, msg.timestamp_ns);
                Err(EnqueueError::Full)
            }
        }
    }

    /// Dequeues the oldest message, if any.
    pub fn dequeue(&self) -> Option<LogMessage> {
        let mut inner = self.inner.lock();
        if inner.len == 0 {
            return None;
        }
        let head = inner.head;
        let msg = inner.slots[head].take();
        inner.head = (head + 1) % inner.capacity();
        inner.len -= 1;
        msg
    }

    /// Dequeues up to `max` messages in FIFO order.
    pub fn dequeue_batch(&self, max: usize) -> Vec<LogMessage> {
        let mut inner = self.inner.lock();
        let n = max.min(inner.len);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let head = inner.head;
            out.push(inner.slots[head].take().expect("len tracked correctly"));
            inner.head = (head + 1) % inner.capacity();
            inner.len -= 1;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(producer_id: usize, ts: i64) -> LogMessage {
        LogMessage {
            payload: PayloadHandle::INVALID,
            timestamp_ns: ts,
            level: 0,
            producer_id,
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let q = DispatchQueue::new(4);
        q.enqueue(msg(0, 1)).unwrap();
        q.enqueue(msg(0, 2)).unwrap();
        assert_eq!(q.dequeue().unwrap().timestamp_ns, 1);
        assert_eq!(q.dequeue().unwrap().timestamp_ns, 2);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn enqueue_fails_when_full() {
        let q = DispatchQueue::new(2);
        q.enqueue(msg(0, 1)).unwrap();
        q.enqueue(msg(0, 2)).unwrap();
        assert_eq!(q.enqueue(msg(0, 3)), Err(EnqueueError::Full));
    }

    #[test]
    fn wraps_around_after_drain() {
        let q = DispatchQueue::new(2);
        q.enqueue(msg(0, 1)).unwrap();
        q.dequeue().unwrap();
        q.enqueue(msg(0, 2)).unwrap();
        q.enqueue(msg(0, 3)).unwrap();
        assert_eq!(q.dequeue().unwrap().timestamp_ns, 2);
        assert_eq!(q.dequeue().unwrap().timestamp_ns, 3);
    }

    #[test]
    fn dequeue_batch_respects_max_and_available_count() {
        let q = DispatchQueue::new(8);
        for i in 0..5 {
            q.enqueue(msg(0, i)).unwrap();
        }
        let batch = q.dequeue_batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].timestamp_ns, 0);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn producer_ids_are_unique() {
        let q = DispatchQueue::new(4);
        let a = q.register_producer();
        let b = q.register_producer();
        assert_ne!(a, b);
    }
}
