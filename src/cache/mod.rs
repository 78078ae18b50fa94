//! Resolution caches.
//!
//! # Data Flow
//! ```text
//! find "a.b.*"  → path cache   → hit:  cached matches (+ backends holding them)
//!                              → miss: scatter-gather, then put
//! search prefix → search cache → hit:  resolved leaf list
//!                              → miss: ask search backend, then put
//! ```
//!
//! # Design Decisions
//! - Two disjoint instances; keys never collide across routing decisions
//! - Lazy expiry on lookup; the sweeper only bounds memory
//! - No single-flight: racing misses each fetch and overwrite

pub mod ttl;

pub use ttl::{TtlCache, Weigh};

use crate::zipper::types::GlobMatch;

/// Path cache value: merged matches and the backends that reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFind {
    pub matches: Vec<GlobMatch>,
    pub backends: Vec<String>,
}

impl Weigh for CachedFind {
    fn weight(&self) -> usize {
        let matches: usize = self.matches.iter().map(|m| m.path.len() + 1).sum();
        matches + self.backends.weight()
    }
}

/// Query → merged find result.
pub type PathCache = TtlCache<CachedFind>;

/// Search query → resolved leaf paths.
pub type SearchCache = TtlCache<Vec<String>>;
