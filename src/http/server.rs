//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Dispatch find/render/info to the engine
//! - Fold per-call stats into metrics

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ZipperConfig;
use crate::http::request::{request_id, FindParams, FirstValue, InfoParams, RenderParams, X_REQUEST_ID};
use crate::http::response::{self, FindFormat, RenderFormat};
use crate::observability::metrics;
use crate::zipper::{Operation, Stats, Zipper};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub zipper: Arc<Zipper>,
    pub config: Arc<ZipperConfig>,
}

/// HTTP front end for the zipper.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(zipper: Arc<Zipper>, config: ZipperConfig) -> Self {
        let state = AppState {
            zipper,
            config: Arc::new(config),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/metrics/find/", get(find_handler))
            .route("/metrics/find", get(find_handler))
            .route("/render/", get(render_handler))
            .route("/render", get(render_handler))
            .route("/info/", get(info_handler))
            .route("/info", get(info_handler))
            .route("/lb_check", get(lb_check_handler))
            .merge(admin::setup_admin_router())
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        let request_id = request_id(req.headers());
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Account for one finished front end call.
fn finish(state: &AppState, operation: Operation, started: Instant, stats: &Stats, ok: bool, url: &str) {
    metrics::record_stats(stats);
    metrics::record_response(operation, started.elapsed(), ok, state.config.buckets, url);
    metrics::record_cache_gauges(state.zipper.path_cache(), state.zipper.search_cache());
}

async fn find_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    FirstValue(params): FirstValue<FindParams>,
) -> Response {
    let started = Instant::now();
    metrics::record_request(Operation::Find);

    let format = match params.validate() {
        Ok(format) => format,
        Err(rejected) => {
            tracing::info!(query = %params.query, reason = rejected.0, "Find rejected");
            metrics::record_response(Operation::Find, started.elapsed(), false, state.config.buckets, "/metrics/find/");
            return rejected.into_response();
        }
    };

    let (result, stats) = state.zipper.find(&params.query).await;
    let url = format!("/metrics/find/?query={}", params.query);
    match result {
        Ok(matches) => {
            finish(&state, Operation::Find, started, &stats, true, &url);
            tracing::info!(
                query = %params.query,
                matches = matches.len(),
                runtime_ms = started.elapsed().as_millis() as u64,
                "Request served"
            );
            match format {
                FindFormat::Json => response::json(response::encode_find_json(&matches)),
                FindFormat::Pickle => response::pickle(&response::encode_find_listing(
                    &matches,
                    state.config.graphite09_compat,
                    response::unix_now(),
                )),
            }
        }
        Err(e) => {
            finish(&state, Operation::Find, started, &stats, false, &url);
            tracing::error!(
                query = %params.query,
                request_id = %request_id(&headers),
                error = %e,
                "Find failed"
            );
            response::engine_failure("error fetching the data")
        }
    }
}

async fn render_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    FirstValue(params): FirstValue<RenderParams>,
) -> Response {
    let started = Instant::now();
    metrics::record_request(Operation::Render);

    let request = match params.validate() {
        Ok(request) => request,
        Err(rejected) => {
            tracing::info!(reason = rejected.0, "Render rejected");
            metrics::record_response(Operation::Render, started.elapsed(), false, state.config.buckets, "/render/");
            return rejected.into_response();
        }
    };

    let (result, stats) = state
        .zipper
        .render(&request.target, request.from, request.until)
        .await;
    let url = format!("/render/?target={}&from={}&until={}", request.target, request.from, request.until);
    match result {
        Ok(series) => {
            finish(&state, Operation::Render, started, &stats, true, &url);
            tracing::info!(
                metric = %request.target,
                series = series.len(),
                runtime_ms = started.elapsed().as_millis() as u64,
                "Request served"
            );
            let encoded = response::encode_render(&series);
            match request.format {
                RenderFormat::Json => response::json(encoded),
                RenderFormat::Pickle => response::pickle(&encoded),
            }
        }
        Err(e) => {
            finish(&state, Operation::Render, started, &stats, false, &url);
            tracing::error!(
                metric = %request.target,
                request_id = %request_id(&headers),
                error = %e,
                "Render failed"
            );
            response::engine_failure("error fetching the data")
        }
    }
}

async fn info_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    FirstValue(params): FirstValue<InfoParams>,
) -> Response {
    let started = Instant::now();
    metrics::record_request(Operation::Info);

    if let Err(rejected) = params.validate() {
        tracing::info!(reason = rejected.0, "Info rejected");
        metrics::record_response(Operation::Info, started.elapsed(), false, state.config.buckets, "/info/");
        return rejected.into_response();
    }

    let (result, stats) = state.zipper.info(&params.target).await;
    let url = format!("/info/?target={}", params.target);
    match result {
        Ok(infos) => {
            finish(&state, Operation::Info, started, &stats, true, &url);
            response::json(infos)
        }
        Err(e) => {
            finish(&state, Operation::Info, started, &stats, false, &url);
            tracing::error!(
                metric = %params.target,
                request_id = %request_id(&headers),
                error = %e,
                "Info failed"
            );
            response::engine_failure("info: error processing request")
        }
    }
}

async fn lb_check_handler() -> &'static str {
    "Ok\n"
}
