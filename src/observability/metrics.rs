//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define zipper metrics (requests, errors, timeouts, cache, latency)
//! - Expose Prometheus-compatible metrics endpoint
//! - Fold per-call `Stats` into process-wide counters
//!
//! # Metrics
//! - `zipper_requests_total` / `zipper_responses_total` / `zipper_errors_total`
//! - `zipper_{find,render,info}_requests_total`, `zipper_{find,render,info}_errors_total`
//! - `zipper_search_requests_total`, `zipper_timeouts_total`
//! - `zipper_cache_{hits,misses}_total`, `zipper_search_cache_{hits,misses}_total`
//! - `zipper_{cache,search_cache}_{size_bytes,items}` (gauges)
//! - `zipper_request_duration_seconds` (histogram, by operation)
//! - `zipper_request_buckets_total` (counter, by latency bucket)
//!
//! # Design Decisions
//! - Facade macros only; without an installed recorder every update is a no-op
//! - Latency buckets double from 50ms; the last bucket is overflow

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::cache::{PathCache, SearchCache};
use crate::zipper::{Operation, Stats};

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("zipper_requests_total", "Front end requests received");
    describe_counter!("zipper_responses_total", "Front end requests answered successfully");
    describe_counter!("zipper_errors_total", "Front end requests answered with an error");
    describe_counter!("zipper_timeouts_total", "Backend replies abandoned at a deadline");
    describe_counter!("zipper_search_requests_total", "Calls routed through the search backend");
    describe_counter!("zipper_cache_hits_total", "Path cache hits");
    describe_counter!("zipper_cache_misses_total", "Path cache misses");
    describe_counter!("zipper_search_cache_hits_total", "Search cache hits");
    describe_counter!("zipper_search_cache_misses_total", "Search cache misses");
    describe_counter!("zipper_request_buckets_total", "Requests per latency bucket");
    describe_gauge!("zipper_cache_size_bytes", Unit::Bytes, "Approximate path cache size");
    describe_gauge!("zipper_cache_items", "Path cache entries");
    describe_gauge!("zipper_search_cache_size_bytes", Unit::Bytes, "Approximate search cache size");
    describe_gauge!("zipper_search_cache_items", "Search cache entries");
    describe_histogram!("zipper_request_duration_seconds", Unit::Seconds, "Front end request latency");
}

pub fn record_request(operation: Operation) {
    counter!("zipper_requests_total").increment(1);
    match operation {
        Operation::Find => counter!("zipper_find_requests_total").increment(1),
        Operation::Render => counter!("zipper_render_requests_total").increment(1),
        Operation::Info => counter!("zipper_info_requests_total").increment(1),
    }
}

/// Record the outcome and latency of one front end request.
pub fn record_response(operation: Operation, elapsed: Duration, ok: bool, buckets: usize, url: &str) {
    if ok {
        counter!("zipper_responses_total").increment(1);
    } else {
        counter!("zipper_errors_total").increment(1);
    }

    histogram!("zipper_request_duration_seconds", "operation" => operation.as_str()).record(elapsed.as_secs_f64());

    let bucket = request_bucket(elapsed, buckets);
    counter!("zipper_request_buckets_total", "bucket" => bucket_label(bucket)).increment(1);
    if bucket == buckets {
        tracing::warn!(url = %url, elapsed_ms = elapsed.as_millis() as u64, "Slow request");
    }
}

/// Fold one call's counters into the process totals.
pub fn record_stats(stats: &Stats) {
    counter!("zipper_timeouts_total").increment(stats.timeouts);
    counter!("zipper_find_errors_total").increment(stats.find_errors);
    counter!("zipper_render_errors_total").increment(stats.render_errors);
    counter!("zipper_info_errors_total").increment(stats.info_errors);
    counter!("zipper_search_requests_total").increment(stats.search_requests);
    counter!("zipper_cache_hits_total").increment(stats.cache_hits);
    counter!("zipper_cache_misses_total").increment(stats.cache_misses);
    counter!("zipper_search_cache_hits_total").increment(stats.search_cache_hits);
    counter!("zipper_search_cache_misses_total").increment(stats.search_cache_misses);
}

pub fn record_cache_gauges(path: &PathCache, search: &SearchCache) {
    gauge!("zipper_cache_size_bytes").set(path.size() as f64);
    gauge!("zipper_cache_items").set(path.item_count() as f64);
    gauge!("zipper_search_cache_size_bytes").set(search.size() as f64);
    gauge!("zipper_search_cache_items").set(search.item_count() as f64);
}

/// Largest accepted `buckets` setting; the last bound is about 3.4 years.
pub const MAX_BUCKETS: usize = 32;

/// Upper bound of bucket `i`: `50 * 2^i` ms.
fn bucket_upper_ms(i: usize) -> u128 {
    u32::try_from(i)
        .ok()
        .and_then(|shift| 50u128.checked_shl(shift))
        .unwrap_or(u128::MAX)
}

/// Index of the latency bucket for `elapsed`.
///
/// Bucket `i` covers `[50 * 2^(i-1), 50 * 2^i)` ms (bucket 0 starts at zero).
/// Anything slower than the last bucket lands in the overflow slot `buckets`.
pub fn request_bucket(elapsed: Duration, buckets: usize) -> usize {
    let ms = elapsed.as_millis();
    (0..buckets).find(|&i| ms < bucket_upper_ms(i)).unwrap_or(buckets)
}

/// Label such as `00050ms_to_00100ms`.
pub fn bucket_label(bucket: usize) -> String {
    let lower = if bucket == 0 { 0 } else { bucket_upper_ms(bucket - 1) };
    format!("{:05}ms_to_{:05}ms", lower, bucket_upper_ms(bucket))
}
