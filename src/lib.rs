//! Metrics query aggregator.
//!
//! Fans find/render/info queries out to a pool of replicated time-series
//! backends, tolerates partial failure, merges the replies and caches path
//! resolution.

pub mod admin;
pub mod backend;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod zipper;

pub use config::ZipperConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use zipper::{Stats, Zipper, ZipperError};
