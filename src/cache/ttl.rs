//! Expiring key/value cache.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Approximate in-memory size of a cached value, used for `size()`.
pub trait Weigh {
    fn weight(&self) -> usize;
}

impl Weigh for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl<T: Weigh> Weigh for Vec<T> {
    fn weight(&self) -> usize {
        self.iter().map(Weigh::weight).sum()
    }
}

struct Entry<V> {
    value: V,
    inserted: Instant,
    weight: usize,
}

/// A concurrent cache whose entries expire a fixed delay after insertion.
///
/// Expiry is evaluated when a key is looked up; an expired entry is removed
/// at that point and the lookup counts as a miss.
pub struct TtlCache<V> {
    name: &'static str,
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    bytes: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Weigh> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            bytes: AtomicI64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the write lock: a concurrent put may have
            // refreshed the entry since the read above.
            let ttl = self.ttl;
            if let Some((_, old)) = self.entries.remove_if(key, |_, e| e.inserted.elapsed() >= ttl) {
                self.bytes.fetch_sub(old.weight as i64, Ordering::Relaxed);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite an entry; its expiry clock restarts.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let weight = key.len() + value.weight();
        let entry = Entry {
            value,
            inserted: Instant::now(),
            weight,
        };
        self.bytes.fetch_add(weight as i64, Ordering::Relaxed);
        if let Some(old) = self.entries.insert(key, entry) {
            self.bytes.fetch_sub(old.weight as i64, Ordering::Relaxed);
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        let mut freed = 0i64;
        self.entries.retain(|_, e| {
            let keep = e.inserted.elapsed() < ttl;
            if !keep {
                removed += 1;
                freed += e.weight as i64;
            }
            keep
        });
        self.bytes.fetch_sub(freed, Ordering::Relaxed);
        removed
    }

    /// Approximate bytes held by keys and values.
    pub fn size(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed).max(0) as u64
    }

    /// Number of stored entries, expired-but-unvisited ones included.
    pub fn item_count(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<V: Clone + Weigh + Send + Sync + 'static> TtlCache<V> {
    /// Periodically purge expired entries until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.purge_expired();
                        if removed > 0 {
                            tracing::debug!(cache = self.name, removed, "Purged expired cache entries");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(cache = self.name, "Cache sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("items", &self.entries.len())
            .finish()
    }
}
