//! Task record and handler traits.

use crate::error::ConveyResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Unique identifier for a task
pub type TaskId = uuid::Uuid;

/// A payload wrapped for queue processing, with its retry metadata.
///
/// The payload itself is opaque to the queue: it is held behind an [`Arc`]
/// handle that is passed to the handler on every attempt, never inspected or
/// mutated. The retry metadata travels with the task through requeues, which
/// is how a re-enqueued task keeps its attempt count and last-attempt stamp.
#[derive(Debug)]
pub struct Task<P> {
    id: TaskId,
    payload: Arc<P>,
    /// Number of handler invocations so far. Incremented by the consumer
    /// immediately before each attempt, together with [`mark_attempted`](Self::mark_attempted).
    pub attempt_count: u32,
    /// When the last attempt started, or `None` before the first attempt.
    pub last_attempt_at: Option<Instant>,
}

impl<P> Task<P> {
    /// Wrap a payload in a fresh task with no attempts recorded.
    pub fn new(payload: P) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            payload: Arc::new(payload),
            attempt_count: 0,
            last_attempt_at: None,
        }
    }

    /// The task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Read-only view of the wrapped payload.
    pub fn payload(&self) -> &P {
        self.payload.as_ref()
    }

    /// Stamp `last_attempt_at` with the current time.
    ///
    /// Does not touch `attempt_count`; the consumer increments the count at
    /// the same call site so the two stay coupled.
    pub fn mark_attempted(&mut self) {
        self.last_attempt_at = Some(Instant::now());
    }

    pub(crate) fn payload_handle(&self) -> Arc<P> {
        Arc::clone(&self.payload)
    }
}

impl<P> Clone for Task<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            payload: Arc::clone(&self.payload),
            attempt_count: self.attempt_count,
            last_attempt_at: self.last_attempt_at,
        }
    }
}

impl<P> From<P> for Task<P> {
    fn from(payload: P) -> Self {
        Task::new(payload)
    }
}

/// Trait for the process and fallback callables a queue is built with.
///
/// Outcomes are explicit values: return `Ok(())` for a handled payload and an
/// error for a failed attempt. A panic inside `handle` is caught by the
/// consumer and treated the same as a returned error.
#[async_trait]
pub trait Handler<P>: Send + Sync {
    /// Process one payload attempt.
    async fn handle(&self, payload: Arc<P>) -> ConveyResult<()>;
}

/// Adapter that lets an async closure act as a [`Handler`].
///
/// Built with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`].
///
/// # Examples
///
/// ```rust
/// use conveyq::prelude::*;
/// use std::sync::Arc;
///
/// let handler = handler_fn(|payload: Arc<String>| async move {
///     if payload.is_empty() {
///         return Err(ConveyError::handler("empty payload"));
///     }
///     Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for HandlerFn<F>
where
    P: Send + Sync + 'static,
    F: Fn(Arc<P>) -> Fut + Send + Sync,
    Fut: Future<Output = ConveyResult<()>> + Send,
{
    async fn handle(&self, payload: Arc<P>) -> ConveyResult<()> {
        (self.f)(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConveyError;

    #[test]
    fn test_new_task_has_no_attempts() {
        let task = Task::new("payload".to_string());
        assert_eq!(task.attempt_count, 0);
        assert!(task.last_attempt_at.is_none());
        assert_eq!(task.payload(), "payload");
    }

    #[tokio::test]
    async fn test_mark_attempted_stamps_without_counting() {
        let mut task = Task::new(42u32);
        task.mark_attempted();
        assert!(task.last_attempt_at.is_some());
        assert_eq!(task.attempt_count, 0);
    }

    #[test]
    fn test_from_wraps_payload_once() {
        let task: Task<u32> = 7u32.into();
        assert_eq!(*task.payload(), 7);

        // An already-built task passes through Into unchanged.
        let mut prebuilt = Task::new(7u32);
        prebuilt.attempt_count = 2;
        let id = prebuilt.id();
        let task: Task<u32> = prebuilt.into();
        assert_eq!(task.id(), id);
        assert_eq!(task.attempt_count, 2);
    }

    #[test]
    fn test_clone_shares_payload_and_keeps_state() {
        let mut task = Task::new(vec![1u8, 2, 3]);
        task.attempt_count = 4;
        let copy = task.clone();
        assert_eq!(copy.id(), task.id());
        assert_eq!(copy.attempt_count, 4);
        assert!(Arc::ptr_eq(&task.payload, &copy.payload));
    }

    #[tokio::test]
    async fn test_handler_fn_forwards_result() {
        let ok = handler_fn(|_: Arc<u32>| async move { Ok(()) });
        assert!(ok.handle(Arc::new(1)).await.is_ok());

        let failing =
            handler_fn(|_: Arc<u32>| async move { Err(ConveyError::handler("nope")) });
        assert!(failing.handle(Arc::new(1)).await.is_err());
    }
}
