//! Metrics collection and exposition.
//!
//! # Metrics
//! - `runtime_config_cache_hits_total` (counter): fetches served from cache
//! - `runtime_config_cache_misses_total` (counter): fetches that read the store
//! - `runtime_config_materialized_total` (counter): records created or restored from defaults
//! - `runtime_config_writes_total` (counter): successful `set` calls
//! - `runtime_config_reconcile_total` (counter): reconciliation runs by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests never install one)
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(hit: bool) {
    if hit {
        counter!("runtime_config_cache_hits_total").increment(1);
    } else {
        counter!("runtime_config_cache_misses_total").increment(1);
    }
}

pub fn record_materialized() {
    counter!("runtime_config_materialized_total").increment(1);
}

pub fn record_write() {
    counter!("runtime_config_writes_total").increment(1);
}

pub fn record_reconcile(outcome: &'static str) {
    counter!("runtime_config_reconcile_total", "outcome" => outcome).increment(1);
}
