//! Server-side load shedding.
//!
//! # Data Flow
//! ```text
//! GET /json
//!     → controller.rs (offer id to the admission queue)
//!         full  → 503 overloaded, counted, no dispatch
//!         admitted → work dispatcher (ticket travels with the work)
//!     → work completes → ticket dropped → slot freed
//! ```

pub mod controller;

pub use controller::{Admission, AdmissionController, AdmissionTicket};
