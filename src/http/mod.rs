//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → /json handler → admission → work dispatcher
//!     → response.rs (receipt, overload indicator, error mapping)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{ErrorBody, StatsBody};
pub use server::{AppState, HttpServer};
