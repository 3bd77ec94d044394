//! Queue observability events.
//!
//! Every outcome the consumer decides is reported as a [`QueueEvent`] to an
//! injectable [`EventSink`], so the core carries no global mutable state. The
//! default sink, [`TracingSink`], forwards events to `tracing`.

use crate::task::TaskId;
use std::sync::Arc;

/// A single observable step in a task's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A task entered the queue through `enqueue`
    TaskEnqueued {
        /// Task identifier
        id: TaskId,
    },
    /// The consumer is about to invoke the handler
    TaskStarted {
        /// Task identifier
        id: TaskId,
        /// Attempt number, 1-based
        attempt: u32,
    },
    /// The handler completed without failure; the task is terminal
    TaskSucceeded {
        /// Task identifier
        id: TaskId,
        /// Total handler invocations for this task
        attempts: u32,
    },
    /// The handler failed and the task was requeued for another attempt
    TaskFailed {
        /// Task identifier
        id: TaskId,
        /// Handler invocations so far
        attempts: u32,
        /// Failure description
        error: String,
    },
    /// The task was popped before its retry delay elapsed and recirculated
    RetryDeferred {
        /// Task identifier
        id: TaskId,
        /// Handler invocations so far
        attempts: u32,
    },
    /// The attempt count exceeded the configured retry limit
    RetriesExhausted {
        /// Task identifier
        id: TaskId,
        /// Handler invocations performed
        attempts: u32,
    },
    /// The fallback handler completed; the task is terminal
    FallbackCompleted {
        /// Task identifier
        id: TaskId,
    },
    /// The fallback handler itself failed; the task is still terminal
    FallbackFailed {
        /// Task identifier
        id: TaskId,
        /// Failure description
        error: String,
    },
    /// Retries were exhausted with no fallback configured; silent drop
    TaskDropped {
        /// Task identifier
        id: TaskId,
        /// Handler invocations performed
        attempts: u32,
    },
    /// A failure was swallowed under the single-attempt policy
    FailureSwallowed {
        /// Task identifier
        id: TaskId,
        /// Failure description
        error: String,
    },
}

/// Collaborator receiving queue events.
///
/// Implementations must be cheap and non-blocking; the consumer calls
/// [`record`](Self::record) inline between processing steps.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &QueueEvent);
}

impl<S> EventSink for Arc<S>
where
    S: EventSink + ?Sized,
{
    fn record(&self, event: &QueueEvent) {
        (**self).record(event);
    }
}

/// Default sink that logs events through `tracing`.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &QueueEvent) {
        match event {
            QueueEvent::TaskEnqueued { id } => {
                tracing::debug!("Enqueued task {}", id);
            }
            QueueEvent::TaskStarted { id, attempt } => {
                tracing::debug!("Dispatching task {} (attempt {})", id, attempt);
            }
            QueueEvent::TaskSucceeded { id, attempts } => {
                tracing::info!("Task {} completed after {} attempt(s)", id, attempts);
            }
            QueueEvent::TaskFailed { id, attempts, error } => {
                tracing::warn!("Task {} failed (attempt {}): {}", id, attempts, error);
            }
            QueueEvent::RetryDeferred { id, attempts } => {
                tracing::trace!("Task {} not yet eligible (attempt {}), recirculating", id, attempts);
            }
            QueueEvent::RetriesExhausted { id, attempts } => {
                tracing::warn!("Task {} exhausted retries after {} attempts", id, attempts);
            }
            QueueEvent::FallbackCompleted { id } => {
                tracing::info!("Task {} handled by fallback", id);
            }
            QueueEvent::FallbackFailed { id, error } => {
                tracing::error!("Fallback for task {} failed: {}", id, error);
            }
            QueueEvent::TaskDropped { id, attempts } => {
                tracing::warn!("Task {} dropped after {} attempts (no fallback)", id, attempts);
            }
            QueueEvent::FailureSwallowed { id, error } => {
                tracing::warn!("Task {} failed with no retry policy, dropping: {}", id, error);
            }
        }
    }
}
