//! The conveyor: public queue surface plus its background consumer.
//!
//! A [`Conveyor`] owns one unbounded FIFO and exactly one consumer task,
//! spawned at construction. Producers on any thread or task enqueue payloads
//! (or pre-built [`Task`]s) and can await [`wait`](Conveyor::wait) for the
//! queue to drain. The consumer applies the retry delay, the retry limit, and
//! the fallback routing configured at build time.

use crate::config::ConveyConfig;
use crate::error::{ConveyError, ConveyResult};
use crate::events::{EventSink, TracingSink};
use crate::queue::{QueueStats, WorkQueue};
use crate::task::{Handler, Task, TaskId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

mod consumer;

use consumer::Consumer;

/// A single-consumer in-memory task queue.
///
/// Cloning a `Conveyor` is cheap and every clone addresses the same queue, so
/// handles can be passed to producers freely, including to handlers that need
/// to enqueue follow-up work. The consumer stops when [`shutdown`](Self::shutdown)
/// is called or when the last clone is dropped.
///
/// # Examples
///
/// ```rust
/// use conveyq::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ConveyResult<()> {
/// let queue = Conveyor::builder()
///     .handler(handler_fn(|payload: Arc<u32>| async move {
///         println!("processing {payload}");
///         Ok(())
///     }))
///     .max_retries(2)
///     .retry_delay(Duration::from_millis(50))
///     .build()?;
///
/// queue.enqueue(7)?;
/// queue.wait().await;
/// # Ok(())
/// # }
/// ```
pub struct Conveyor<P> {
    queue: WorkQueue<P>,
    config: ConveyConfig,
    shutdown: Arc<watch::Sender<bool>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    running: Arc<AtomicBool>,
}

impl<P> std::fmt::Debug for Conveyor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conveyor")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl<P> Clone for Conveyor<P> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            config: self.config.clone(),
            shutdown: Arc::clone(&self.shutdown),
            worker: Arc::clone(&self.worker),
            running: Arc::clone(&self.running),
        }
    }
}

impl<P> Conveyor<P>
where
    P: Send + Sync + 'static,
{
    /// Start building a conveyor.
    pub fn builder() -> ConveyorBuilder<P> {
        ConveyorBuilder::new()
    }

    /// Put an item on the queue.
    ///
    /// A raw payload is wrapped in a fresh [`Task`]; a pre-built task passes
    /// through unchanged, retry state and all. Never blocks. The only error is
    /// enqueueing after the consumer has stopped.
    pub fn enqueue(&self, item: impl Into<Task<P>>) -> ConveyResult<TaskId> {
        if !self.is_running() {
            return Err(ConveyError::NotRunning);
        }
        let task = item.into();
        let id = task.id();
        self.queue.submit(task)?;
        Ok(id)
    }

    /// Wait until every task enqueued so far has reached a terminal outcome.
    ///
    /// Tasks enqueued while the wait is pending extend it, including tasks the
    /// handler enqueues from inside an attempt. With
    /// [`FailurePolicy::Requeue`](crate::config::FailurePolicy::Requeue) a
    /// task that never succeeds keeps this from returning.
    pub async fn wait(&self) {
        self.queue.pending.drained().await;
    }

    /// Snapshot of the queue's counters.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats.snapshot(self.queue.pending.count())
    }

    /// Whether the consumer is still processing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The configuration this conveyor was built with.
    pub fn config(&self) -> &ConveyConfig {
        &self.config
    }

    /// Stop the consumer after its current task.
    ///
    /// Tasks still queued are discarded with the consumer. Waits up to the
    /// configured shutdown timeout for the loop to exit, then aborts it.
    pub async fn shutdown(&self) -> ConveyResult<()> {
        if !self.is_running() {
            return Err(ConveyError::NotRunning);
        }

        let _ = self.shutdown.send(true);

        let handle = self.worker.lock().await.take();
        let Some(handle) = handle else {
            return Err(ConveyError::NotRunning);
        };

        let abort = handle.abort_handle();
        let timeout_secs = self.config.shutdown_timeout.as_secs();
        match timeout(self.config.shutdown_timeout, handle).await {
            Ok(_) => {
                tracing::debug!("Conveyor stopped");
                Ok(())
            }
            Err(_) => {
                abort.abort();
                Err(ConveyError::ShutdownTimeout { timeout_secs })
            }
        }
    }
}

/// Builder for [`Conveyor`].
///
/// The handler is required; fallback, event sink, and configuration are
/// optional. [`build`](Self::build) validates the configuration and spawns the
/// consumer, so it must run inside a tokio runtime.
pub struct ConveyorBuilder<P> {
    config: ConveyConfig,
    handler: Option<Arc<dyn Handler<P>>>,
    fallback: Option<Arc<dyn Handler<P>>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl<P> Default for ConveyorBuilder<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ConveyorBuilder<P>
where
    P: Send + Sync + 'static,
{
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ConveyConfig::default(),
            handler: None,
            fallback: None,
            sink: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ConveyConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the handler every payload is processed with. Required.
    pub fn handler(mut self, handler: impl Handler<P> + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set the fallback invoked once retries are exhausted.
    pub fn fallback(mut self, fallback: impl Handler<P> + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Replace the default tracing sink with a custom event sink.
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the minimum time between attempts of the same task.
    pub fn retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.config.retry_delay = Some(delay);
        self
    }

    /// Set the maximum number of retries before fallback routing.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = Some(max_retries);
        self
    }

    /// Set the failure policy for limit-free configurations.
    pub fn failure_policy(mut self, policy: crate::config::FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Validate the configuration and start the conveyor.
    pub fn build(self) -> ConveyResult<Conveyor<P>> {
        let Self {
            config,
            handler,
            fallback,
            sink,
        } = self;

        let handler = handler.ok_or_else(|| ConveyError::config("A handler is required"))?;
        config
            .validate()
            .map_err(|errors| ConveyError::config(errors.join("; ")))?;

        let sink = sink.unwrap_or_else(|| Arc::new(TracingSink));
        let (queue, rx) = WorkQueue::channel(sink);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));

        let consumer = Consumer {
            queue: queue.clone(),
            rx,
            handler,
            fallback,
            config: config.clone(),
            shutdown: shutdown_rx,
            running: Arc::clone(&running),
        };
        let worker = tokio::spawn(consumer.run());
        tracing::debug!("Conveyor started");

        Ok(Conveyor {
            queue,
            config,
            shutdown: Arc::new(shutdown_tx),
            worker: Arc::new(Mutex::new(Some(worker))),
            running,
        })
    }
}
