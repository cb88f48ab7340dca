//! Bounded work execution primitives.
//!
//! # Data Flow
//! ```text
//! submitter
//!     → item.rs (stamp id + submission time)
//!     → pool.rs (try_send into bounded queue, or rejection policy)
//!     → worker task (FIFO, catch-all at the boundary)
//!
//! queue.rs: fixed-capacity FIFO used for admission bookkeeping
//! ```
//!
//! # Design Decisions
//! - No blocking enqueue anywhere; overflow is a signal
//! - Fixed worker count, spawned once
//! - Shutdown has a deadline; stragglers are aborted

pub mod item;
pub mod pool;
pub mod queue;

pub use item::{WorkIdGenerator, WorkItem};
pub use pool::{BoundedWorkerPool, LogAndDrop, RejectReason, RejectionPolicy, ShutdownReport, Submission, Task};
pub use queue::BoundedQueue;
