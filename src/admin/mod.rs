//! Read-only introspection endpoints.
//!
//! Served on the main listener; they expose process state only and accept
//! no input.

pub mod handlers;

use axum::{routing::get, Router};

use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/cache", get(get_cache))
}
