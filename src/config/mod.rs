//! Startup configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → lifecycle::startup builds store, cache and services from it
//! ```
//!
//! # Design Decisions
//! - Startup config is immutable once loaded; runtime settings live in the store
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AdminConfig, CacheBackend, CacheConfig, ListenerConfig, ObservabilityConfig, ServiceConfig, StoreBackend, StoreConfig};
