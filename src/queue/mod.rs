//! The FIFO and drain bookkeeping behind a conveyor.
//!
//! The queue is an unbounded multi-producer single-consumer channel plus a
//! pending-work counter. The counter tracks logical tasks, not channel
//! entries: it goes up once per `enqueue` and down once per terminal outcome,
//! so recirculated and retried tasks keep exactly one unit of pending work
//! alive until they finish. [`Conveyor::wait`](crate::core::Conveyor::wait)
//! resolves when the counter reaches zero.

use crate::error::{ConveyError, ConveyResult};
use crate::events::{EventSink, QueueEvent};
use crate::task::Task;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};

/// Statistics about the work a conveyor has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks accepted through `enqueue`
    pub enqueued: u64,
    /// Tasks that reached the success outcome
    pub succeeded: u64,
    /// Failed attempts that were requeued for retry
    pub retried: u64,
    /// Recirculations of tasks not yet past their retry delay
    pub deferred: u64,
    /// Tasks routed to the fallback handler
    pub fallback: u64,
    /// Tasks dropped after exhausting retries with no fallback
    pub dropped: u64,
    /// Failures swallowed under the single-attempt policy
    pub swallowed: u64,
    /// Tasks not yet terminal
    pub pending: u64,
}

/// Atomic counters the snapshot is taken from.
#[derive(Debug, Default)]
pub(crate) struct StatsCells {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    deferred: AtomicU64,
    fallback: AtomicU64,
    dropped: AtomicU64,
    swallowed: AtomicU64,
}

impl StatsCells {
    pub(crate) fn note_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_fallback(&self) {
        self.fallback.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_swallowed(&self) {
        self.swallowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending: u64) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            swallowed: self.swallowed.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Pending-work counter for drain detection.
///
/// Backed by a `watch` channel so waiters re-check on every change and no
/// wakeup can be lost between the check and the await.
#[derive(Debug)]
pub(crate) struct PendingWork {
    cell: watch::Sender<u64>,
}

impl PendingWork {
    pub(crate) fn new() -> Self {
        let (cell, _) = watch::channel(0);
        Self { cell }
    }

    pub(crate) fn add(&self) {
        self.cell.send_modify(|n| *n += 1);
    }

    pub(crate) fn complete(&self) {
        self.cell.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub(crate) fn count(&self) -> u64 {
        *self.cell.borrow()
    }

    pub(crate) async fn drained(&self) {
        let mut rx = self.cell.subscribe();
        // Cannot fail: the sender lives in self for the duration of the call.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Shared handle onto the FIFO, the counter, and the event sink.
pub(crate) struct WorkQueue<P> {
    tx: mpsc::UnboundedSender<Task<P>>,
    pub(crate) pending: Arc<PendingWork>,
    pub(crate) stats: Arc<StatsCells>,
    pub(crate) sink: Arc<dyn EventSink>,
}

impl<P> Clone for WorkQueue<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
            stats: Arc::clone(&self.stats),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<P> WorkQueue<P> {
    pub(crate) fn channel(
        sink: Arc<dyn EventSink>,
    ) -> (Self, mpsc::UnboundedReceiver<Task<P>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            pending: Arc::new(PendingWork::new()),
            stats: Arc::new(StatsCells::default()),
            sink,
        };
        (queue, rx)
    }

    /// Accept a task as new pending work.
    pub(crate) fn submit(&self, task: Task<P>) -> ConveyResult<()> {
        let id = task.id();
        self.pending.add();
        if self.tx.send(task).is_err() {
            self.pending.complete();
            return Err(ConveyError::NotRunning);
        }
        self.stats.note_enqueued();
        self.sink.record(&QueueEvent::TaskEnqueued { id });
        Ok(())
    }

    /// Put a live task back at the tail without touching the pending counter.
    pub(crate) fn recycle(&self, task: Task<P>) {
        if self.tx.send(task).is_err() {
            // Consumer gone mid-flight: settle the task so waiters can return.
            self.pending.complete();
        }
    }

    /// Mark one task terminal.
    pub(crate) fn settle(&self) {
        self.pending.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TracingSink;

    fn test_queue() -> (WorkQueue<String>, mpsc::UnboundedReceiver<Task<String>>) {
        WorkQueue::channel(Arc::new(TracingSink))
    }

    #[tokio::test]
    async fn test_submit_counts_pending_and_preserves_order() {
        let (queue, mut rx) = test_queue();

        queue.submit(Task::new("first".to_string())).unwrap();
        queue.submit(Task::new("second".to_string())).unwrap();
        assert_eq!(queue.pending.count(), 2);
        assert_eq!(queue.stats.snapshot(2).enqueued, 2);

        assert_eq!(rx.recv().await.unwrap().payload(), "first");
        assert_eq!(rx.recv().await.unwrap().payload(), "second");
    }

    #[tokio::test]
    async fn test_recycle_leaves_pending_untouched() {
        let (queue, mut rx) = test_queue();

        queue.submit(Task::new("job".to_string())).unwrap();
        let task = rx.recv().await.unwrap();
        let id = task.id();

        queue.recycle(task);
        assert_eq!(queue.pending.count(), 1);
        assert_eq!(rx.recv().await.unwrap().id(), id);

        queue.settle();
        assert_eq!(queue.pending.count(), 0);
    }

    #[tokio::test]
    async fn test_submit_fails_once_receiver_is_gone() {
        let (queue, rx) = test_queue();
        drop(rx);

        let err = queue.submit(Task::new("late".to_string())).unwrap_err();
        assert!(matches!(err, ConveyError::NotRunning));
        // The provisional pending unit was rolled back.
        assert_eq!(queue.pending.count(), 0);
    }

    #[tokio::test]
    async fn test_drained_returns_immediately_when_idle() {
        let pending = PendingWork::new();
        pending.drained().await;
    }

    #[tokio::test]
    async fn test_drained_waits_for_outstanding_work() {
        let pending = Arc::new(PendingWork::new());
        pending.add();
        pending.add();

        let waiter = {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move { pending.drained().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        pending.complete();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        pending.complete();
        waiter.await.unwrap();
    }
}
