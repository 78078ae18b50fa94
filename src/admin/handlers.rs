use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::{TtlCache, Weigh};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends: usize,
    pub carbonsearch: Option<String>,
    pub timeouts_ms: TimeoutsMs,
}

#[derive(Debug, Serialize)]
pub struct TimeoutsMs {
    pub global: u64,
    pub after_started: u64,
    pub connect: u64,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub address: String,
    /// 0 = unlimited.
    pub concurrency_limit: usize,
    pub in_flight: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub name: &'static str,
    pub size_bytes: u64,
    pub items: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

impl CacheStatus {
    fn of<V: Clone + Weigh>(cache: &TtlCache<V>) -> Self {
        Self {
            name: cache.name(),
            size_bytes: cache.size(),
            items: cache.item_count(),
            hits: cache.hits(),
            misses: cache.misses(),
            ttl_secs: cache.ttl().as_secs(),
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let timeouts = state.zipper.timeouts();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backends: state.zipper.pool().len(),
        carbonsearch: state
            .zipper
            .router()
            .search()
            .map(|route| route.prefix().to_string()),
        timeouts_ms: TimeoutsMs {
            global: timeouts.global.as_millis() as u64,
            after_started: timeouts.after_started.as_millis() as u64,
            connect: timeouts.connect.as_millis() as u64,
        },
    })
}

pub async fn get_backends(State(state): State<AppState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .zipper
        .pool()
        .backends()
        .iter()
        .map(|b| BackendStatus {
            address: b.address().to_string(),
            concurrency_limit: b.limiter().limit(),
            in_flight: b.limiter().in_flight(),
        })
        .collect();
    Json(statuses)
}

pub async fn get_cache(State(state): State<AppState>) -> Json<Vec<CacheStatus>> {
    Json(vec![
        CacheStatus::of(state.zipper.path_cache()),
        CacheStatus::of(state.zipper.search_cache()),
    ])
}
