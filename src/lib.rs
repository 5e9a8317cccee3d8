//! Runtime configuration store.
//!
//! Server modules declare typed settings with defaults; values are persisted
//! in a durable store, served through a TTL cache, and reconciled against the
//! declared set at every process start.

// Core subsystems
pub mod cache;
pub mod registry;
pub mod runtime;
pub mod store;

// Schema maintenance
pub mod modules;
pub mod reconcile;

// Serving surface
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use registry::{ConfigNode, SchemaRegistry};
pub use runtime::{RuntimeConfig, RuntimeConfigError};
