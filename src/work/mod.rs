//! Simulated server-side work.
//!
//! # Data Flow
//! ```text
//! admitted WorkItem + AdmissionTicket
//!     → dispatcher.rs (wait for a worker slot, run on blocking pool)
//!     → SimulatedWork::perform (keygen.rs by default)
//!     → WorkReceipt { id, key, elapse_ms }
//! ```

pub mod dispatcher;
pub mod keygen;

use serde::{Deserialize, Serialize};

pub use dispatcher::{DispatchError, WorkDispatcher};
pub use keygen::KeypairWork;

/// CPU-bound, latency-bearing unit of work. Runs on a blocking thread.
pub trait SimulatedWork: Send + Sync + 'static {
    fn perform(&self, id: u64) -> WorkArtifact;
}

/// What one unit of work produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkArtifact {
    pub key: String,
    pub rounds: u32,
}

/// Success payload of `GET /json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkReceipt {
    pub id: u64,
    pub key: String,
    pub elapse_ms: u64,
}
