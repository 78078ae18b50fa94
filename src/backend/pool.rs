//! Backend pool management.
//!
//! # Responsibilities
//! - Build the shared pooled transport from static configuration
//! - Construct one `Backend` per configured address
//! - Select backend subsets by address (path-cache targeting)

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::client::Backend;
use crate::zipper::error::ZipperResult;

/// Transport settings shared by every backend.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub max_idle_conns_per_host: usize,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub concurrency_limit: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_conns_per_host: 100,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_millis(200),
            concurrency_limit: 0,
        }
    }
}

/// Build the pooled HTTP transport.
pub fn build_transport(config: &TransportConfig) -> Result<reqwest::Client, reqwest::Error> {
    let keep_alive = (!config.keep_alive.is_zero()).then_some(config.keep_alive);
    reqwest::Client::builder()
        .pool_max_idle_per_host(config.max_idle_conns_per_host)
        .connect_timeout(config.connect_timeout)
        .tcp_keepalive(keep_alive)
        .no_proxy()
        .build()
}

/// The static set of ordinary backends.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    client: reqwest::Client,
    transport: TransportConfig,
}

impl BackendPool {
    /// Create the pool. Duplicate addresses collapse into one backend.
    pub fn new(addresses: &[String], transport: TransportConfig) -> ZipperResult<Self> {
        let client = build_transport(&transport)?;

        let mut seen = HashSet::new();
        let mut backends = Vec::with_capacity(addresses.len());
        for address in addresses {
            let backend = Backend::new(address, client.clone(), transport.concurrency_limit)?;
            if seen.insert(backend.address().to_string()) {
                backends.push(Arc::new(backend));
            } else {
                tracing::warn!(backend = %address, "Ignoring duplicate backend address");
            }
        }

        Ok(Self {
            backends,
            client,
            transport,
        })
    }

    /// Build a backend outside the pool (the search backend) that shares the
    /// pool's transport and limits.
    pub fn detached(&self, address: &str) -> ZipperResult<Arc<Backend>> {
        let backend = Backend::new(address, self.client.clone(), self.transport.concurrency_limit)?;
        Ok(Arc::new(backend))
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends whose address is in `addresses`, in pool order.
    /// Falls back to the whole pool when none match.
    pub fn select(&self, addresses: &[String]) -> Vec<Arc<Backend>> {
        let wanted: HashSet<&str> = addresses.iter().map(String::as_str).collect();
        let selected: Vec<_> = self
            .backends
            .iter()
            .filter(|b| wanted.contains(b.address()))
            .cloned()
            .collect();

        if selected.is_empty() {
            self.backends.clone()
        } else {
            selected
        }
    }
}
