//! In-memory background job queue.
//!
//! This crate provides:
//! - Thread-safe job storage with FIFO or priority dequeue
//! - Atomic claim of the next pending job for worker pools
//! - Enqueue notifications so idle workers wake immediately
//! - Per-job progress handles for processors

pub mod error;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::JobProgress;
pub use queue::{DequeueStrategy, JobQueue, QueueConfig};
