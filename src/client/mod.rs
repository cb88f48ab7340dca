//! Load-generating client.
//!
//! # Data Flow
//! ```text
//! driver.rs (fixed-interval submissions)
//!     → BoundedWorkerPool (overflow → LogAndDrop)
//!     → requester.rs (ResilientCallPipeline around GET /json)
//!     → ApiResponse tallied into a DriverReport
//! ```

pub mod driver;
pub mod requester;

pub use driver::{DriverReport, LoadDriver};
pub use requester::{classify, ApiError, ApiOutcome, ApiRequester, ApiResponse};
