//! Query route lookup.
//!
//! # Responsibilities
//! - Hold the compiled CarbonSearch route, if configured
//! - Classify a find/render query as plain, search or completer
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Completer is checked before search; it is the narrower condition
//! - Explicit Plain rather than an Option, so callers match exhaustively

use std::sync::Arc;

use crate::backend::Backend;
use crate::routing::matcher::{AndMatcher, Matcher, PrefixMatcher, SuffixMatcher};

/// Prefix-triggered resolution through the search backend.
#[derive(Debug)]
pub struct SearchRoute {
    prefix: PrefixMatcher,
    completer: AndMatcher,
    backend: Arc<Backend>,
}

impl SearchRoute {
    pub fn new(prefix: impl Into<String>, backend: Arc<Backend>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: PrefixMatcher::new(prefix.clone()),
            completer: AndMatcher::new(vec![
                Box::new(PrefixMatcher::new(prefix)),
                Box::new(SuffixMatcher::new("*")),
            ]),
            backend,
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.prefix()
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

/// Routing decision for one query.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Ordinary pool.
    Plain,
    /// Resolve through the search backend, then query the pool per leaf.
    Search(&'a SearchRoute),
    /// Autocomplete: search backend answers verbatim.
    Completer(&'a SearchRoute),
}

#[derive(Debug, Default)]
pub struct QueryRouter {
    search: Option<SearchRoute>,
}

impl QueryRouter {
    /// Router with search routing disabled.
    pub fn plain() -> Self {
        Self { search: None }
    }

    pub fn with_search(route: SearchRoute) -> Self {
        Self {
            search: Some(route),
        }
    }

    pub fn search(&self) -> Option<&SearchRoute> {
        self.search.as_ref()
    }

    /// Route a find query.
    pub fn route_find(&self, query: &str) -> Route<'_> {
        match &self.search {
            Some(route) if route.completer.matches(query) => Route::Completer(route),
            Some(route) if route.prefix.matches(query) => Route::Search(route),
            _ => Route::Plain,
        }
    }

    /// Route a render target; completion does not apply to data fetches.
    pub fn route_render(&self, target: &str) -> Route<'_> {
        match &self.search {
            Some(route) if route.prefix.matches(target) => Route::Search(route),
            _ => Route::Plain,
        }
    }
}
