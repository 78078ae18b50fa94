//! Front end routes, driven through the axum router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use serde_pickle::DeOptions;
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use metric_zipper::config::ZipperConfig;
use metric_zipper::http::{AppState, HttpServer};
use metric_zipper::zipper::{GlobMatch, Zipper};

fn app(zipper: Zipper, config: ZipperConfig) -> Router {
    HttpServer::build_router(AppState {
        zipper: Arc::new(zipper),
        config: Arc::new(config),
    })
}

#[derive(Debug, Deserialize, PartialEq)]
struct Listed {
    path: String,
    is_leaf: bool,
    intervals: Vec<(i64, i64)>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Listed09 {
    metric_path: String,
    #[serde(rename = "isLeaf")]
    is_leaf: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Series {
    name: String,
    start: i32,
    step: i32,
    end: i32,
    values: Vec<Option<f64>>,
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, request_id, body.to_vec())
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_find_json() {
    let backend = spawn_backend(MockBackend::new().with_find("a.*", vec![GlobMatch::new("a.b", true)])).await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, request_id, body) = get(&app, "/metrics/find/?query=a.*&format=json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(request_id.is_some());
    assert_eq!(as_json(&body), json!([{"path": "a.b", "isLeaf": true}]));
}

#[tokio::test]
async fn test_find_pickle_listing() {
    let backend = spawn_backend(MockBackend::new().with_find("a.*", vec![GlobMatch::new("a.b", false)])).await;

    let app1 = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());
    for uri in ["/metrics/find/?query=a.*&format=pickle", "/metrics/find/?query=a.*"] {
        let response = app1
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pickle");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let listing: Vec<Listed> = serde_pickle::from_slice(&body, DeOptions::new()).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].path, "a.b");
        assert!(!listing[0].is_leaf);
        assert_eq!(listing[0].intervals.len(), 1);
        assert_eq!(listing[0].intervals[0].0, 0);
        assert!(listing[0].intervals[0].1 > 0);
    }

    let compat = ZipperConfig {
        graphite09_compat: true,
        ..Default::default()
    };
    let app2 = app(zipper(&[&backend], None, timeouts(2_000, 500)), compat);
    let (_, _, body) = get(&app2, "/metrics/find/?query=a.*&format=pickle").await;
    let listing: Vec<Listed09> = serde_pickle::from_slice(&body, DeOptions::new()).unwrap();
    assert_eq!(
        listing,
        vec![Listed09 {
            metric_path: "a.b".into(),
            is_leaf: false,
        }]
    );
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let backend = spawn_backend(MockBackend::new()).await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/lb_check")
                .header("x-request-id", "caller-supplied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "caller-supplied");
}

#[tokio::test]
async fn test_bad_requests() {
    let backend = spawn_backend(MockBackend::new()).await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let cases = [
        ("/metrics/find/?query=", "empty query"),
        ("/metrics/find/?query=a.*&format=protobuf", "unsupported format"),
        ("/metrics/find/?query=a.*&format=legacy", "unsupported format"),
        ("/info/?target=a.b&format=pickle", "unsupported format"),
        ("/render/?target=a.b&from=x&until=10", "from is not a integer"),
        ("/render/?target=a.b&from=0&until=", "until is not a integer"),
        ("/render/?target=&from=0&until=10", "empty target"),
        ("/info/?target=", "info: empty target"),
    ];
    for (uri, message) in cases {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(String::from_utf8(body).unwrap(), message);
    }
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_engine_error_is_500() {
    let backend = spawn_backend(MockBackend::new().with_status(500)).await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, _, body) = get(&app, "/metrics/find/?query=a.*").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(String::from_utf8(body).unwrap(), "error fetching the data");
}

#[tokio::test]
async fn test_render_encodes_absent_as_null() {
    let backend = spawn_backend(MockBackend::new().with_render(
        "a.b",
        vec![series("a.b", &[Some(1.5), None])],
    ))
    .await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, _, body) = get(&app, "/render/?target=a.b&from=1000&until=1120&format=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        as_json(&body),
        json!([{"name": "a.b", "start": 1000, "step": 60, "end": 1120, "values": [1.5, null]}])
    );
}

#[tokio::test]
async fn test_render_pickle_encodes_absent_as_none() {
    let backend = spawn_backend(MockBackend::new().with_render(
        "a.b",
        vec![series("a.b", &[Some(1.5), None])],
    ))
    .await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, _, body) = get(&app, "/render/?target=a.b&from=1000&until=1120").await;
    assert_eq!(status, StatusCode::OK);
    let decoded: Vec<Series> = serde_pickle::from_slice(&body, DeOptions::new()).unwrap();
    assert_eq!(
        decoded,
        vec![Series {
            name: "a.b".into(),
            start: 1000,
            step: 60,
            end: 1120,
            values: vec![Some(1.5), None],
        }]
    );
}

#[tokio::test]
async fn test_repeated_parameters_use_first_value() {
    let backend = spawn_backend(
        MockBackend::new()
            .with_find("a.*", vec![GlobMatch::new("a.b", true)])
            .with_render("a.b", vec![series("a.b", &[Some(1.0), Some(2.0)])]),
    )
    .await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, _, body) = get(
        &app,
        "/render/?target=a.b&target=zz.top&from=1000&until=1120&format=json&format=pickle",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)[0]["name"], "a.b");

    let (status, _, body) = get(&app, "/metrics/find/?query=a.*&query=b.*&format=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!([{"path": "a.b", "isLeaf": true}]));
}

#[tokio::test]
async fn test_lb_check_and_admin() {
    let backend = spawn_backend(MockBackend::new().with_find("a.*", vec![GlobMatch::new("a.b", true)])).await;
    let app = app(zipper(&[&backend], None, timeouts(2_000, 500)), ZipperConfig::default());

    let (status, _, body) = get(&app, "/lb_check").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Ok\n");

    let (status, _, body) = get(&app, "/admin/status").await;
    assert_eq!(status, StatusCode::OK);
    let status_json = as_json(&body);
    assert_eq!(status_json["backends"], 1);
    assert_eq!(status_json["timeouts_ms"]["global"], 2_000);

    let (_, _, body) = get(&app, "/admin/backends").await;
    assert_eq!(as_json(&body)[0]["address"], backend.address.as_str());

    get(&app, "/metrics/find/?query=a.*").await;
    let (_, _, body) = get(&app, "/admin/cache").await;
    let caches = as_json(&body);
    assert_eq!(caches[0]["name"], "path");
    assert_eq!(caches[0]["items"], 2);
    assert_eq!(caches[1]["name"], "search");
}
