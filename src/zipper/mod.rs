//! Fan-out / cache / merge engine.
//!
//! # Data Flow
//! ```text
//! find(query)
//!     → QueryRouter
//!         Plain     → path cache → miss: dispatch(pool) → merge_find → populate
//!         Search    → search cache → miss: dispatch(search backend) → leaves
//!                   → find_plain per leaf (join_all) → union
//!         Completer → dispatch(search backend) → matches verbatim
//!
//! render(target) / info(target)
//!     → path cache lookup on target (narrows the backend set on hit)
//!     → dispatch → merge_render / merge_info
//! ```
//!
//! # Design Decisions
//! - One deadline per logical call, shared by every nested dispatch
//! - Each nested call returns its own `Stats`; the parent sums them
//! - Empty results are never cached
//! - Engine objects are injected, nothing is process-global

pub mod error;
pub mod merge;
pub mod scatter;
pub mod stats;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;

use crate::backend::{Backend, BackendPool};
use crate::cache::{CachedFind, PathCache, SearchCache, TtlCache};
use crate::config::ZipperConfig;
use crate::resilience::Timeouts;
use crate::routing::{QueryRouter, Route, SearchRoute};

pub use error::{BackendError, Operation, ZipperError, ZipperResult};
pub use merge::{FindMerge, FirstSeen, MergeKey};
pub use scatter::{dispatch, BackendReply};
pub use stats::Stats;
pub use types::{FetchResponse, GlobMatch, Retention, ServerInfo};

use merge::{merge_find, merge_info, merge_render};

/// The aggregation engine. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Zipper {
    pool: Arc<BackendPool>,
    router: QueryRouter,
    path_cache: Arc<PathCache>,
    search_cache: Arc<SearchCache>,
    timeouts: Timeouts,
}

impl Zipper {
    pub fn new(
        pool: Arc<BackendPool>,
        router: QueryRouter,
        path_cache: Arc<PathCache>,
        search_cache: Arc<SearchCache>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            pool,
            router,
            path_cache,
            search_cache,
            timeouts,
        }
    }

    /// Build the pool, router and caches described by `config`.
    pub fn from_config(config: &ZipperConfig) -> ZipperResult<Self> {
        let pool = Arc::new(BackendPool::new(&config.backends, config.transport())?);

        let search = &config.carbonsearch;
        let router = if search.is_enabled() {
            let backend = pool.detached(&search.backend)?;
            QueryRouter::with_search(SearchRoute::new(search.prefix.clone(), backend))
        } else if search.is_partial() {
            return Err(ZipperError::IncompleteSearch);
        } else {
            QueryRouter::plain()
        };

        let expire = Duration::from_secs(config.expire_delay_secs);
        Ok(Self::new(
            pool,
            router,
            Arc::new(TtlCache::new("path", expire)),
            Arc::new(TtlCache::new("search", expire)),
            Timeouts::from(&config.timeouts),
        ))
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn path_cache(&self) -> &Arc<PathCache> {
        &self.path_cache
    }

    pub fn search_cache(&self) -> &Arc<SearchCache> {
        &self.search_cache
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Resolve a glob query to metric paths.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn find(&self, query: &str) -> (ZipperResult<Vec<GlobMatch>>, Stats) {
        let deadline = self.timeouts.call_deadline();

        match self.router.route_find(query) {
            Route::Plain => self.find_plain(query, deadline).await,
            Route::Completer(route) => {
                let (result, mut stats) = self.complete(route, query, deadline).await;
                stats.search_requests += 1;
                (result, stats)
            }
            Route::Search(route) => {
                let (result, mut stats) = self.search_find(route, query, deadline).await;
                stats.search_requests += 1;
                (result, stats)
            }
        }
    }

    /// Fetch series for `target` over `[from, until]`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn render(&self, target: &str, from: i32, until: i32) -> (ZipperResult<Vec<FetchResponse>>, Stats) {
        let deadline = self.timeouts.call_deadline();

        match self.router.route_render(target) {
            Route::Search(route) => {
                let (result, mut stats) = self.search_render(route, target, from, until, deadline).await;
                stats.search_requests += 1;
                (result, stats)
            }
            Route::Plain | Route::Completer(_) => self.render_plain(target, from, until, deadline).await,
        }
    }

    /// Per-backend metadata for `target`. Never search-routed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn info(&self, target: &str) -> (ZipperResult<BTreeMap<String, ServerInfo>>, Stats) {
        let deadline = self.timeouts.call_deadline();
        let mut stats = Stats::default();
        let targets = self.targets_for(target, &mut stats);

        let owned = target.to_string();
        let replies = dispatch(&targets, self.timeouts.after_started, deadline, move |b| {
            let target = owned.clone();
            async move { b.info(&target).await }
        })
        .await;

        stats.record_failures(Operation::Info, &replies);
        (merge_info(&replies), stats)
    }

    async fn find_plain(&self, query: &str, deadline: Instant) -> (ZipperResult<Vec<GlobMatch>>, Stats) {
        let mut stats = Stats::default();

        if let Some(cached) = self.path_cache.get(query) {
            stats.cache_hits += 1;
            return (Ok(cached.matches), stats);
        }
        stats.cache_misses += 1;

        let replies = dispatch_find(self.pool.backends(), query, self.timeouts.after_started, deadline).await;
        stats.record_failures(Operation::Find, &replies);

        match merge_find(&replies) {
            Ok(merged) => {
                self.populate_path_cache(query, &merged);
                (Ok(merged.matches), stats)
            }
            Err(e) => (Err(e), stats),
        }
    }

    fn populate_path_cache(&self, query: &str, merged: &FindMerge) {
        if merged.matches.is_empty() {
            return;
        }

        self.path_cache.put(
            query,
            CachedFind {
                matches: merged.matches.clone(),
                backends: merged.responders.clone(),
            },
        );

        for m in merged.matches.iter().filter(|m| m.path != query) {
            let backends = merged.holders.get(&m.path).cloned().unwrap_or_default();
            self.path_cache.put(
                m.path.clone(),
                CachedFind {
                    matches: vec![m.clone()],
                    backends,
                },
            );
        }
    }

    /// Resolve a search-prefixed query to real leaf paths.
    async fn resolve_search(&self, route: &SearchRoute, query: &str, deadline: Instant) -> (ZipperResult<Vec<String>>, Stats) {
        let mut stats = Stats::default();

        if let Some(leaves) = self.search_cache.get(query) {
            stats.search_cache_hits += 1;
            return (Ok(leaves), stats);
        }
        stats.search_cache_misses += 1;

        let search = std::slice::from_ref(route.backend());
        let replies = dispatch_find(search, query, self.timeouts.after_started, deadline).await;
        stats.record_failures(Operation::Find, &replies);

        let merged = match merge_find(&replies) {
            Ok(merged) => merged,
            // The search backend does not know the name: nothing to expand.
            Err(_) if replies.iter().all(|r| matches!(&r.outcome, Err(e) if e.is_not_found())) => {
                return (Ok(Vec::new()), stats);
            }
            Err(e) => return (Err(e), stats),
        };

        let leaves: Vec<String> = merged
            .matches
            .into_iter()
            .filter(|m| m.is_leaf)
            .map(|m| m.path)
            .collect();

        tracing::debug!(query = %query, leaves = leaves.len(), "Resolved search query");
        if !leaves.is_empty() {
            self.search_cache.put(query, leaves.clone());
        }
        (Ok(leaves), stats)
    }

    async fn search_find(&self, route: &SearchRoute, query: &str, deadline: Instant) -> (ZipperResult<Vec<GlobMatch>>, Stats) {
        let (leaves, mut stats) = self.resolve_search(route, query, deadline).await;
        let leaves = match leaves {
            Ok(leaves) => leaves,
            Err(e) => return (Err(e), stats),
        };
        if leaves.is_empty() {
            return (Ok(Vec::new()), stats);
        }

        let results = join_all(leaves.iter().map(|leaf| self.find_plain(leaf, deadline))).await;

        let mut matches = FirstSeen::new();
        let mut any_success = false;
        for (result, sub) in results {
            stats += sub;
            if let Ok(found) = result {
                any_success = true;
                matches.extend(found);
            }
        }

        if !any_success {
            return (Err(ZipperError::AllBackendsFailed(Operation::Find)), stats);
        }
        (Ok(matches.into_vec()), stats)
    }

    async fn complete(&self, route: &SearchRoute, query: &str, deadline: Instant) -> (ZipperResult<Vec<GlobMatch>>, Stats) {
        let mut stats = Stats::default();
        let search = std::slice::from_ref(route.backend());
        let replies = dispatch_find(search, query, self.timeouts.after_started, deadline).await;
        stats.record_failures(Operation::Find, &replies);
        (merge_find(&replies).map(|merged| merged.matches), stats)
    }

    async fn render_plain(
        &self,
        target: &str,
        from: i32,
        until: i32,
        deadline: Instant,
    ) -> (ZipperResult<Vec<FetchResponse>>, Stats) {
        let mut stats = Stats::default();
        let targets = self.targets_for(target, &mut stats);

        let owned = target.to_string();
        let replies = dispatch(&targets, self.timeouts.after_started, deadline, move |b| {
            let target = owned.clone();
            async move { b.render(&target, from, until).await }
        })
        .await;

        stats.record_failures(Operation::Render, &replies);
        (merge_render(&replies), stats)
    }

    async fn search_render(
        &self,
        route: &SearchRoute,
        target: &str,
        from: i32,
        until: i32,
        deadline: Instant,
    ) -> (ZipperResult<Vec<FetchResponse>>, Stats) {
        let (leaves, mut stats) = self.resolve_search(route, target, deadline).await;
        let leaves = match leaves {
            Ok(leaves) => leaves,
            Err(e) => return (Err(e), stats),
        };
        if leaves.is_empty() {
            return (Ok(Vec::new()), stats);
        }

        let results = join_all(
            leaves
                .iter()
                .map(|leaf| self.render_plain(leaf, from, until, deadline)),
        )
        .await;

        let mut series = FirstSeen::new();
        let mut any_success = false;
        for (result, sub) in results {
            stats += sub;
            if let Ok(fetched) = result {
                any_success = true;
                series.extend(fetched);
            }
        }

        if !any_success {
            return (Err(ZipperError::AllBackendsFailed(Operation::Render)), stats);
        }
        (Ok(series.into_vec()), stats)
    }

    /// Backends known to hold `target`, or the whole pool.
    fn targets_for(&self, target: &str, stats: &mut Stats) -> Vec<Arc<Backend>> {
        match self.path_cache.get(target) {
            Some(cached) => {
                stats.cache_hits += 1;
                self.pool.select(&cached.backends)
            }
            None => {
                stats.cache_misses += 1;
                self.pool.backends().to_vec()
            }
        }
    }
}

async fn dispatch_find(
    targets: &[Arc<Backend>],
    query: &str,
    after_started: Duration,
    deadline: Instant,
) -> Vec<BackendReply<Vec<GlobMatch>>> {
    let owned = query.to_string();
    dispatch(targets, after_started, deadline, move |b| {
        let query = owned.clone();
        async move { b.find(&query).await }
    })
    .await
}
