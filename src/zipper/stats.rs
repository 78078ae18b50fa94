//! Per-call counters.
//!
//! A `Stats` value is created at call entry, mutated only by that call and
//! handed back to the caller with the result. Folding it into process-wide
//! totals is the caller's job (see `observability::metrics::record_stats`).

use std::ops::AddAssign;
use serde::Serialize;

use crate::zipper::error::Operation;
use crate::zipper::scatter::BackendReply;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub timeouts: u64,
    pub find_errors: u64,
    pub render_errors: u64,
    pub info_errors: u64,
    pub search_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub search_cache_hits: u64,
    pub search_cache_misses: u64,
}

impl Stats {
    /// Count the failed replies of one dispatch.
    ///
    /// Timeouts go to `timeouts`; a 404 is an ordinary miss and is not counted;
    /// everything else counts against the operation's error counter.
    pub fn record_failures<T>(&mut self, operation: Operation, replies: &[BackendReply<T>]) {
        for reply in replies {
            let Err(e) = &reply.outcome else { continue };
            if e.is_timeout() {
                self.timeouts += 1;
            } else if !e.is_not_found() {
                *self.errors_mut(operation) += 1;
            }
        }
    }

    pub fn errors(&self, operation: Operation) -> u64 {
        match operation {
            Operation::Find => self.find_errors,
            Operation::Render => self.render_errors,
            Operation::Info => self.info_errors,
        }
    }

    fn errors_mut(&mut self, operation: Operation) -> &mut u64 {
        match operation {
            Operation::Find => &mut self.find_errors,
            Operation::Render => &mut self.render_errors,
            Operation::Info => &mut self.info_errors,
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.timeouts += other.timeouts;
        self.find_errors += other.find_errors;
        self.render_errors += other.render_errors;
        self.info_errors += other.info_errors;
        self.search_requests += other.search_requests;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.search_cache_hits += other.search_cache_hits;
        self.search_cache_misses += other.search_cache_misses;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zipper::error::BackendError;
    use std::time::Duration;

    fn reply(outcome: Result<(), BackendError>) -> BackendReply<()> {
        BackendReply {
            backend: "http://b".into(),
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_record_failures_classifies() {
        let replies = vec![
            reply(Ok(())),
            reply(Err(BackendError::Timeout)),
            reply(Err(BackendError::NotFound)),
            reply(Err(BackendError::Status(500))),
            reply(Err(BackendError::Malformed("eof".into()))),
        ];
        let mut stats = Stats::default();
        stats.record_failures(Operation::Render, &replies);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.render_errors, 2);
        assert_eq!(stats.find_errors, 0);
    }

    #[test]
    fn test_add_assign_sums_every_field() {
        let mut a = Stats {
            timeouts: 1,
            cache_hits: 2,
            ..Default::default()
        };
        a += Stats {
            timeouts: 3,
            search_cache_misses: 1,
            ..Default::default()
        };
        assert_eq!(a.timeouts, 4);
        assert_eq!(a.cache_hits, 2);
        assert_eq!(a.search_cache_misses, 1);
    }
}
