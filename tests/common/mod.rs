//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use metric_zipper::backend::{BackendPool, TransportConfig};
use metric_zipper::cache::TtlCache;
use metric_zipper::resilience::Timeouts;
use metric_zipper::routing::{QueryRouter, SearchRoute};
use metric_zipper::zipper::types::{GlobResponse, MultiFetchResponse};
use metric_zipper::zipper::{FetchResponse, GlobMatch, ServerInfo, Zipper};

/// Canned backend: unknown queries answer 404, like a real store.
#[derive(Debug, Default, Clone)]
pub struct MockBackend {
    pub find: HashMap<String, Vec<GlobMatch>>,
    pub render: HashMap<String, Vec<FetchResponse>>,
    pub info: HashMap<String, ServerInfo>,
    pub delay: Duration,
    /// Answer every request with this status instead.
    pub status: Option<u16>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_find(mut self, query: &str, matches: Vec<GlobMatch>) -> Self {
        self.find.insert(query.to_string(), matches);
        self
    }

    pub fn with_render(mut self, target: &str, series: Vec<FetchResponse>) -> Self {
        self.render.insert(target.to_string(), series);
        self
    }

    pub fn with_info(mut self, target: &str, info: ServerInfo) -> Self {
        self.info.insert(target.to_string(), info);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// A mock backend listening on an ephemeral port.
#[derive(Debug, Clone)]
pub struct RunningBackend {
    pub address: String,
    pub hits: Arc<AtomicUsize>,
}

impl RunningBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    mock: Arc<MockBackend>,
    hits: Arc<AtomicUsize>,
}

type Params = Query<HashMap<String, String>>;

impl MockState {
    /// Count the hit, wait the configured delay, and apply a forced status.
    async fn enter(&self) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.mock.delay).await;
        self.mock
            .status
            .map(|code| StatusCode::from_u16(code).unwrap().into_response())
    }
}

async fn find(State(state): State<MockState>, Query(params): Params) -> Response {
    if let Some(forced) = state.enter().await {
        return forced;
    }
    let query = params.get("query").cloned().unwrap_or_default();
    match state.mock.find.get(&query) {
        Some(matches) => Json(GlobResponse {
            name: query,
            matches: matches.clone(),
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn render(State(state): State<MockState>, Query(params): Params) -> Response {
    if let Some(forced) = state.enter().await {
        return forced;
    }
    let target = params.get("target").cloned().unwrap_or_default();
    match state.mock.render.get(&target) {
        Some(series) => Json(MultiFetchResponse {
            metrics: series.clone(),
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn info(State(state): State<MockState>, Query(params): Params) -> Response {
    if let Some(forced) = state.enter().await {
        return forced;
    }
    let target = params.get("target").cloned().unwrap_or_default();
    match state.mock.info.get(&target) {
        Some(info) => Json(info.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `mock` on 127.0.0.1 with an ephemeral port.
pub async fn spawn_backend(mock: MockBackend) -> RunningBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = MockState {
        mock: Arc::new(mock),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/metrics/find/", get(find))
        .route("/render/", get(render))
        .route("/info/", get(info))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    RunningBackend {
        address: format!("http://{}", addr),
        hits,
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn timeouts(global_ms: u64, after_started_ms: u64) -> Timeouts {
    Timeouts {
        global: Duration::from_millis(global_ms),
        after_started: Duration::from_millis(after_started_ms),
        connect: Duration::from_millis(200),
    }
}

/// Engine over `backends`, optionally with a search route.
pub fn zipper(backends: &[&RunningBackend], search: Option<(&str, &RunningBackend)>, timeouts: Timeouts) -> Zipper {
    zipper_with_addresses(
        &backends.iter().map(|b| b.address.clone()).collect::<Vec<_>>(),
        search,
        timeouts,
    )
}

pub fn zipper_with_addresses(addresses: &[String], search: Option<(&str, &RunningBackend)>, timeouts: Timeouts) -> Zipper {
    let transport = TransportConfig {
        connect_timeout: timeouts.connect,
        ..TransportConfig::default()
    };
    let pool = Arc::new(BackendPool::new(addresses, transport).unwrap());

    let router = match search {
        Some((prefix, backend)) => {
            let search_backend = pool.detached(&backend.address).unwrap();
            QueryRouter::with_search(SearchRoute::new(prefix, search_backend))
        }
        None => QueryRouter::plain(),
    };

    Zipper::new(
        pool,
        router,
        Arc::new(TtlCache::new("path", Duration::from_secs(60))),
        Arc::new(TtlCache::new("search", Duration::from_secs(60))),
        timeouts,
    )
}

pub fn series(name: &str, values: &[Option<f64>]) -> FetchResponse {
    FetchResponse {
        name: name.to_string(),
        start_time: 1000,
        stop_time: 1000 + 60 * values.len() as i32,
        step_time: 60,
        values: values.iter().map(|v| v.unwrap_or(0.0)).collect(),
        is_absent: values.iter().map(Option::is_none).collect(),
    }
}
