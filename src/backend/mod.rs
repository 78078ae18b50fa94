//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! static backend address list
//!     → pool.rs (shared pooled transport, one Backend per address)
//!     → client.rs (find / render / info over HTTP, failure classification)
//!     → limiter.rs (per-backend permit pool, waits instead of rejecting)
//! ```
//!
//! # Design Decisions
//! - Backends are fixed at startup; no runtime add/remove
//! - One transport shared by all backends; idle connections capped per host
//! - Permits are RAII guards so cancellation never leaks a slot

pub mod client;
pub mod limiter;
pub mod pool;

pub use client::Backend;
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use pool::{BackendPool, TransportConfig};
