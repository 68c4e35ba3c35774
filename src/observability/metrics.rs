//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sync_cache_lookups_total` (counter): cache reads by result (hit, miss)
//! - `sync_fetch_coalesced_total` (counter): callers joined to an in-flight fetch
//! - `sync_fetches_total` (counter): underlying fetches by outcome
//! - `sync_fetch_duration_seconds` (histogram): fetch latency
//! - `sync_stale_writes_rejected_total` (counter): out-of-order cache writes dropped
//! - `sync_snapshots_published_total` (counter): bus publishes by domain
//! - `sync_refresh_skipped_total` (counter): rate-limited refreshes by domain
//! - `sync_bus_subscribers` (gauge): live subscribers by domain
//! - `sync_tx_transitions_total` (counter): tracker transitions by status

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with an HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("sync_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_coalesced() {
    counter!("sync_fetch_coalesced_total").increment(1);
}

pub fn record_fetch(success: bool, elapsed: Duration) {
    let outcome = if success { "ok" } else { "error" };
    counter!("sync_fetches_total", "outcome" => outcome).increment(1);
    histogram!("sync_fetch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_stale_write_rejected() {
    counter!("sync_stale_writes_rejected_total").increment(1);
}

pub fn record_snapshot_published(domain: &'static str) {
    counter!("sync_snapshots_published_total", "domain" => domain).increment(1);
}

pub fn record_refresh_skipped(domain: &'static str) {
    counter!("sync_refresh_skipped_total", "domain" => domain).increment(1);
}

pub fn record_bus_subscribers(domain: &'static str, count: usize) {
    gauge!("sync_bus_subscribers", "domain" => domain).set(count as f64);
}

pub fn record_tx_transition(status: &'static str) {
    counter!("sync_tx_transitions_total", "status" => status).increment(1);
}
