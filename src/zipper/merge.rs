//! Response merging.
//!
//! Every merge walks the replies in arrival order, so the result is
//! deterministic for a given arrival order. Failed replies are skipped;
//! zero successful replies is an error for every operation.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::zipper::error::{Operation, ZipperError, ZipperResult};
use crate::zipper::scatter::BackendReply;
use crate::zipper::types::{FetchResponse, GlobMatch, ServerInfo};

/// Merged find result plus where each path was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindMerge {
    /// Deduplicated matches, first-seen order.
    pub matches: Vec<GlobMatch>,
    /// Path → backends that reported it, arrival order.
    pub holders: HashMap<String, Vec<String>>,
    /// Backends that reported at least one match.
    pub responders: Vec<String>,
}

/// Union of glob matches deduplicated by path; the first-seen leaf flag wins.
pub fn merge_find(replies: &[BackendReply<Vec<GlobMatch>>]) -> ZipperResult<FindMerge> {
    let mut merged = FindMerge::default();
    let mut any_success = false;

    for reply in replies {
        let Ok(matches) = &reply.outcome else { continue };
        any_success = true;
        if !matches.is_empty() {
            merged.responders.push(reply.backend.clone());
        }
        for m in matches {
            let holders = merged.holders.entry(m.path.clone()).or_default();
            if holders.is_empty() {
                merged.matches.push(m.clone());
            }
            if !holders.contains(&reply.backend) {
                holders.push(reply.backend.clone());
            }
        }
    }

    if !any_success {
        return Err(ZipperError::AllBackendsFailed(Operation::Find));
    }
    Ok(merged)
}

/// Identity used to drop duplicates when results are unioned.
pub trait MergeKey {
    fn merge_key(&self) -> &str;
}

impl MergeKey for GlobMatch {
    fn merge_key(&self) -> &str {
        &self.path
    }
}

impl MergeKey for FetchResponse {
    fn merge_key(&self) -> &str {
        &self.name
    }
}

/// Union in first-seen order; later items with a seen key are dropped.
#[derive(Debug)]
pub struct FirstSeen<T> {
    seen: HashSet<String>,
    items: Vec<T>,
}

impl<T: MergeKey> FirstSeen<T> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    pub fn extend(&mut self, more: impl IntoIterator<Item = T>) {
        for item in more {
            if self.seen.insert(item.merge_key().to_string()) {
                self.items.push(item);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: MergeKey> Default for FirstSeen<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One series per metric name, duplicates reconciled point by point.
pub fn merge_render(replies: &[BackendReply<Vec<FetchResponse>>]) -> ZipperResult<Vec<FetchResponse>> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, Vec<&FetchResponse>> = HashMap::new();
    let mut any_success = false;

    for reply in replies {
        let Ok(series) = &reply.outcome else { continue };
        any_success = true;
        for s in series {
            let copies = by_name.entry(s.name.clone()).or_default();
            if copies.is_empty() {
                order.push(s.name.clone());
            }
            copies.push(s);
        }
    }

    if !any_success {
        return Err(ZipperError::AllBackendsFailed(Operation::Render));
    }

    let merged = order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .map(|copies| reconcile(&copies))
        .collect();
    Ok(merged)
}

/// Fill absent points of the first copy from later copies.
///
/// Where the base has a value it is kept; where it is absent the first later
/// copy holding a value supplies it. Copies that disagree with the base on
/// start, step or length cannot be aligned and are ignored.
fn reconcile(copies: &[&FetchResponse]) -> FetchResponse {
    let mut base = copies[0].clone();
    if copies.len() == 1 {
        return base;
    }
    base.is_absent.resize(base.values.len(), true);

    let others: Vec<&FetchResponse> = copies[1..]
        .iter()
        .copied()
        .filter(|other| {
            let aligned = other.start_time == base.start_time
                && other.step_time == base.step_time
                && other.values.len() == base.values.len();
            if !aligned {
                tracing::warn!(
                    metric = %base.name,
                    base_points = base.values.len(),
                    other_points = other.values.len(),
                    base_start = base.start_time,
                    other_start = other.start_time,
                    base_step = base.step_time,
                    other_step = other.step_time,
                    "Series copies disagree on shape, skipping copy"
                );
            }
            aligned
        })
        .collect();

    for i in 0..base.values.len() {
        if !base.is_absent[i] {
            continue;
        }
        if let Some(other) = others.iter().find(|o| !o.absent_at(i)) {
            base.values[i] = other.values[i];
            base.is_absent[i] = false;
        }
    }
    base
}

/// Per-backend metadata, no value-level merge.
pub fn merge_info(replies: &[BackendReply<ServerInfo>]) -> ZipperResult<BTreeMap<String, ServerInfo>> {
    let infos: BTreeMap<String, ServerInfo> = replies
        .iter()
        .filter_map(|r| r.outcome.as_ref().ok().map(|info| (r.backend.clone(), info.clone())))
        .collect();

    if infos.is_empty() {
        return Err(ZipperError::AllBackendsFailed(Operation::Info));
    }
    Ok(infos)
}
