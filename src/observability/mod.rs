//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry / store / cache / runtime / reconcile
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
