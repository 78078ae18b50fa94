//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming query (find query or render target)
//!     → router.rs (search route lookup)
//!     → matcher.rs (prefix / completer conditions)
//!     → Return: Plain, Search or Completer
//!
//! Route Compilation (at startup):
//!     CarbonSearchConfig {prefix, backend}
//!     → both empty: plain router
//!     → both set: SearchRoute with a detached search backend
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Info is never routed; it always goes to the pool

pub mod matcher;
pub mod router;

pub use router::{QueryRouter, Route, SearchRoute};
