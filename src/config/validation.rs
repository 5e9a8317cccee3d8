//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTLs within (0, one year], addresses parse)
//! - Check backend-specific requirements (sqlite backends need a path)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CacheBackend, ServiceConfig, StoreBackend};

/// Upper bound for every TTL setting.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    if config.store.backend == StoreBackend::Sqlite
        && config.store.path.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::new("store.path", "required for the sqlite backend"));
    }
    if config.cache.backend == CacheBackend::Sqlite && config.cache_path().is_none() {
        errors.push(ValidationError::new(
            "cache.path",
            "required for the sqlite backend unless the store is sqlite",
        ));
    }

    check_ttl(&mut errors, "cache.ttl_secs", config.cache.ttl_secs);
    check_ttl(&mut errors, "cache.lock_ttl_secs", config.cache.lock_ttl_secs);
    if config.cache.lock_key.is_empty() {
        errors.push(ValidationError::new("cache.lock_key", "must not be empty"));
    }
    if !config.cache.key_prefix.is_empty() && config.cache.lock_key.starts_with(&config.cache.key_prefix) {
        errors.push(ValidationError::new(
            "cache.lock_key",
            "must not live inside the setting key namespace",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_ttl(errors: &mut Vec<ValidationError>, field: &'static str, secs: u64) {
    if secs == 0 {
        errors.push(ValidationError::new(field, "must be > 0"));
    } else if secs > MAX_TTL_SECS {
        errors.push(ValidationError::new(field, format!("must be <= {MAX_TTL_SECS}")));
    }
}
