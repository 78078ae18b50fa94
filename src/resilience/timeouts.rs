//! Tiered timeout policy.
//!
//! # Responsibilities
//! - Hold the global / after-started / connect budgets
//! - Derive the per-call deadline that bounds every nested dispatch
//!
//! # Design Decisions
//! - One deadline per logical call, computed at entry
//! - The after-started window only shortens the deadline, never extends it
//! - Connect is enforced by the transport, not by the coordinator

use std::time::Duration;
use tokio::time::Instant;

use crate::config::TimeoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Hard deadline for the whole logical call.
    pub global: Duration,
    /// Grace window after the first successful reply.
    pub after_started: Duration,
    /// Connection establishment per backend attempt.
    pub connect: Duration,
}

impl Timeouts {
    /// Deadline for a call starting now.
    pub fn call_deadline(&self) -> Instant {
        Instant::now() + self.global
    }

    /// `connect <= after_started <= global`.
    pub fn is_well_ordered(&self) -> bool {
        self.connect <= self.after_started && self.after_started <= self.global
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            global: Duration::from_secs(10),
            after_started: Duration::from_secs(2),
            connect: Duration::from_millis(200),
        }
    }
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            global: Duration::from_millis(config.global_ms),
            after_started: Duration::from_millis(config.after_started_ms),
            connect: Duration::from_millis(config.connect_ms),
        }
    }
}
