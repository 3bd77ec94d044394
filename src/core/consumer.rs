//! The background consumer loop.
//!
//! One consumer per conveyor, spawned at construction. Each pass pops a task,
//! applies the delay gate and the retry policy, and invokes the handler or
//! fallback. Invocations run in their own spawned task so a panic inside user
//! code is caught as a `JoinError` and folded into the failure path; nothing a
//! handler does can take the loop down.

use crate::config::{ConveyConfig, FailurePolicy};
use crate::error::{ConveyError, ConveyResult};
use crate::events::QueueEvent;
use crate::queue::WorkQueue;
use crate::task::{Handler, Task};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};

pub(crate) struct Consumer<P> {
    pub(crate) queue: WorkQueue<P>,
    pub(crate) rx: mpsc::UnboundedReceiver<Task<P>>,
    pub(crate) handler: Arc<dyn Handler<P>>,
    pub(crate) fallback: Option<Arc<dyn Handler<P>>>,
    pub(crate) config: ConveyConfig,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) running: Arc<AtomicBool>,
}

impl<P> Consumer<P>
where
    P: Send + Sync + 'static,
{
    pub(crate) async fn run(mut self) {
        tracing::debug!("Consumer loop started");

        loop {
            let task = tokio::select! {
                changed = self.shutdown.changed() => {
                    // Err means every conveyor handle is gone; true means an
                    // explicit shutdown. Both end the loop.
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                maybe = self.rx.recv() => match maybe {
                    Some(task) => task,
                    None => break,
                },
            };

            self.step(task).await;
        }

        self.running.store(false, Ordering::Release);
        tracing::debug!("Consumer loop stopped");
    }

    /// Run one task through the delay gate and the retry state machine.
    async fn step(&self, mut task: Task<P>) {
        if task.last_attempt_at.is_none() {
            // First delivery bypasses the delay gate.
            task.mark_attempted();
        } else if let Some(delay) = self.config.retry_delay {
            if let Some(last) = task.last_attempt_at {
                if Instant::now() < last + delay {
                    self.queue.stats.note_deferred();
                    self.queue.sink.record(&QueueEvent::RetryDeferred {
                        id: task.id(),
                        attempts: task.attempt_count,
                    });
                    self.queue.recycle(task);
                    // Bound the recirculation spin without changing when the
                    // task becomes eligible.
                    sleep(self.config.poll_interval).await;
                    return;
                }
            }
        }

        match self.config.max_retries {
            Some(limit) if task.attempt_count > limit => self.exhaust(task).await,
            Some(_) => self.attempt(task, true).await,
            None => {
                let requeue_failures =
                    self.config.failure_policy == FailurePolicy::Requeue;
                self.attempt(task, requeue_failures).await;
            }
        }
    }

    /// Invoke the handler once, requeueing or settling by outcome.
    async fn attempt(&self, mut task: Task<P>, retry_on_failure: bool) {
        task.attempt_count = task.attempt_count.saturating_add(1);
        task.mark_attempted();

        let id = task.id();
        let attempts = task.attempt_count;
        self.queue.sink.record(&QueueEvent::TaskStarted {
            id,
            attempt: attempts,
        });

        match self.invoke(&self.handler, &task).await {
            Ok(()) => {
                self.queue.stats.note_succeeded();
                self.queue
                    .sink
                    .record(&QueueEvent::TaskSucceeded { id, attempts });
                self.queue.settle();
            }
            Err(error) if retry_on_failure => {
                self.queue.stats.note_retried();
                self.queue.sink.record(&QueueEvent::TaskFailed {
                    id,
                    attempts,
                    error: error.to_string(),
                });
                self.queue.recycle(task);
            }
            Err(error) => {
                self.queue.stats.note_swallowed();
                self.queue.sink.record(&QueueEvent::FailureSwallowed {
                    id,
                    error: error.to_string(),
                });
                self.queue.settle();
            }
        }
    }

    /// Route a task whose attempts exceeded the limit to the fallback.
    async fn exhaust(&self, task: Task<P>) {
        let id = task.id();
        let attempts = task.attempt_count;
        self.queue
            .sink
            .record(&QueueEvent::RetriesExhausted { id, attempts });

        match &self.fallback {
            Some(fallback) => {
                self.queue.stats.note_fallback();
                match self.invoke(fallback, &task).await {
                    Ok(()) => {
                        self.queue.sink.record(&QueueEvent::FallbackCompleted { id });
                    }
                    Err(error) => {
                        // The fallback is never retried; the task stays
                        // terminal and the loop moves on.
                        self.queue.sink.record(&QueueEvent::FallbackFailed {
                            id,
                            error: error.to_string(),
                        });
                    }
                }
            }
            None => {
                self.queue.stats.note_dropped();
                self.queue
                    .sink
                    .record(&QueueEvent::TaskDropped { id, attempts });
            }
        }

        self.queue.settle();
    }

    /// Invoke a handler in its own task, mapping a panic to a failure value.
    async fn invoke(
        &self,
        target: &Arc<dyn Handler<P>>,
        task: &Task<P>,
    ) -> ConveyResult<()> {
        let target = Arc::clone(target);
        let payload = task.payload_handle();
        let call = tokio::spawn(async move { target.handle(payload).await });

        match call.await {
            Ok(result) => result,
            Err(join_error) => Err(ConveyError::HandlerPanicked {
                message: join_error.to_string(),
            }),
        }
    }
}
