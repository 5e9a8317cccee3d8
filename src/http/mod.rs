//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → public routes (/api/v1/*) or admin routes (/admin/*, Bearer key)
//!     → RuntimeConfig / Reconciler
//!     → response.rs (error → status code + JSON body)
//! ```

pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
