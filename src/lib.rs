//! # conveyq
//!
//! A lightweight in-process task queue for Rust applications: one unbounded
//! FIFO, one background consumer, and a retry state machine around every task.
//!
//! ## Features
//!
//! - **Opaque payloads**: the queue moves your values by handle and never
//!   inspects them
//! - **Bounded retries**: a configurable retry count with fallback routing
//!   once attempts are exhausted
//! - **Delayed re-delivery**: an optional minimum delay between attempts
//! - **Drain detection**: `wait()` resolves once every enqueued task has
//!   reached a terminal outcome
//! - **Injectable observability**: queue events go to a pluggable sink,
//!   logging through `tracing` by default
//!
//! ## Quick Start
//!
//! ```rust
//! use conveyq::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> ConveyResult<()> {
//!     let queue = Conveyor::builder()
//!         .handler(handler_fn(|payload: Arc<String>| async move {
//!             tracing::info!("delivering {payload}");
//!             Ok(())
//!         }))
//!         .max_retries(3)
//!         .retry_delay(Duration::from_millis(250))
//!         .build()?;
//!
//!     queue.enqueue("hello".to_string())?;
//!     queue.wait().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod queue;
pub mod task;

pub mod prelude {
    pub use crate::config::{ConveyConfig, FailurePolicy};
    pub use crate::core::{Conveyor, ConveyorBuilder};
    pub use crate::error::{ConveyError, ConveyResult};
    pub use crate::events::{EventSink, QueueEvent, TracingSink};
    pub use crate::queue::QueueStats;
    pub use crate::task::{Handler, HandlerFn, Task, TaskId, handler_fn};
    pub use async_trait::async_trait;
}

pub use crate::config::{ConveyConfig, FailurePolicy};
pub use crate::core::{Conveyor, ConveyorBuilder};
pub use crate::error::{ConveyError, ConveyResult};
pub use crate::events::{EventSink, QueueEvent, TracingSink};
pub use crate::queue::QueueStats;
pub use crate::task::{Handler, HandlerFn, Task, TaskId, handler_fn};
pub use async_trait::async_trait;
