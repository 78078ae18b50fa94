//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call:
//!     → timeouts.rs (call deadline from the global budget)
//!     → scatter-gather (grace window after first success, abandon stragglers)
//!     → transport (connect timeout per backend attempt)
//! ```
//!
//! # Design Decisions
//! - Every backend call has a deadline
//! - One shot per backend per call: no retries, no backoff
//! - Partial failure is absorbed and counted, not propagated

pub mod timeouts;

pub use timeouts::Timeouts;
