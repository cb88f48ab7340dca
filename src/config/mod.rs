//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//!     → CLI flags override selected fields in the binaries
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::BreakerConfig;
pub use schema::ClientConfig;
pub use schema::HarnessConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
pub use schema::ServerConfig;
pub use schema::WorkConfig;
