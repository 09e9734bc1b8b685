//! Host-name to address cache.
//!
//! Stores, per host, the set of known IP literals ("nodes") together with
//! their address family, optional locale tag and observed failure count.
//! Entries never expire on their own: they live until the host or the
//! address is invalidated, the table is reset, or a bootstrap load
//! replaces the whole table.

use crate::dns::classify::{classify, IpVersion};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One known IP for a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNode {
    /// Textual literal as returned by the resolver or configuration.
    pub raw_ip: String,
    /// Address family, derived once at insertion.
    pub version: IpVersion,
    /// Country/region tag; only bootstrap configuration sets this.
    pub locale: Option<String>,
    /// Connection failures observed by callers.
    pub failure_count: u32,
}

impl AddressNode {
    /// Create a node, classifying the literal.
    pub fn new(raw_ip: impl Into<String>) -> Self {
        let raw_ip = raw_ip.into();
        Self {
            version: classify(&raw_ip),
            raw_ip,
            locale: None,
            failure_count: 0,
        }
    }

    /// Tag the node with a locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// One host's resolution state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub host_name: String,
    nodes: Vec<AddressNode>,
}

impl DomainRecord {
    /// Create an empty record for a host.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            nodes: Vec::new(),
        }
    }

    /// Nodes known for this host. Order is not significant.
    pub fn nodes(&self) -> &[AddressNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check whether a literal is already present.
    pub fn contains(&self, raw_ip: &str) -> bool {
        self.nodes.iter().any(|n| n.raw_ip == raw_ip)
    }

    /// Insert a node unless its literal is already present.
    ///
    /// Returns `true` if the node was added.
    pub fn insert(&mut self, node: AddressNode) -> bool {
        if self.contains(&node.raw_ip) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    fn remove_ip(&mut self, raw_ip: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.raw_ip != raw_ip);
        self.nodes.len() != before
    }

    fn node_mut(&mut self, raw_ip: &str) -> Option<&mut AddressNode> {
        self.nodes.iter_mut().find(|n| n.raw_ip == raw_ip)
    }
}

/// Normalize a host name for use as a table key.
fn key(host: &str) -> String {
    host.to_ascii_lowercase()
}

/// Thread-safe host cache.
///
/// Every operation, reads included, goes through a single table-wide lock,
/// so check-then-insert and iterate-then-remove are atomic with respect to
/// every other mutator. Lookups hand out owned snapshots.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone, Default)]
pub struct HostCache {
    table: Arc<RwLock<HashMap<String, DomainRecord>>>,
}

impl HostCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire table with `entries`.
    ///
    /// Entries with an empty host name are skipped, as are hosts whose node
    /// list is empty. Duplicate literals within one host collapse into one
    /// node. Returns the number of hosts loaded.
    pub fn load_bulk<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Vec<AddressNode>)>,
    {
        let mut fresh: HashMap<String, DomainRecord> = HashMap::new();

        for (host, nodes) in entries {
            if host.is_empty() {
                tracing::warn!("skipping bootstrap entry without host name");
                continue;
            }
            if nodes.is_empty() {
                tracing::warn!(host = %host, "skipping bootstrap entry without addresses");
                continue;
            }
            let record = fresh
                .entry(key(&host))
                .or_insert_with(|| DomainRecord::new(&host));
            for node in nodes {
                record.insert(node);
            }
        }

        let loaded = fresh.len();
        *self.table.write() = fresh;
        tracing::debug!(hosts = loaded, "host cache replaced by bulk load");
        loaded
    }

    /// Record `raw_ip` for `host`, creating the host's record if needed.
    ///
    /// Idempotent: returns `false` if the literal was already cached for
    /// this host, or if `host` is empty.
    pub fn upsert_address(&self, host: &str, raw_ip: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        let node = AddressNode::new(raw_ip);
        let version = node.version;

        let mut table = self.table.write();
        let inserted = table
            .entry(key(host))
            .or_insert_with(|| DomainRecord::new(host))
            .insert(node);
        drop(table);

        if inserted {
            tracing::debug!(host = %host, ip = %raw_ip, version = %version, "cached address");
        }
        inserted
    }

    /// Remove `raw_ip` from every host. Returns how many records held it.
    ///
    /// Records left without nodes are kept; only `invalidate_host` and
    /// `reset` destroy records.
    pub fn invalidate_ip(&self, raw_ip: &str) -> usize {
        let removed = self
            .table
            .write()
            .values_mut()
            .map(|record| record.remove_ip(raw_ip))
            .filter(|&hit| hit)
            .count();

        tracing::debug!(ip = %raw_ip, hosts = removed, "invalidated address");
        removed
    }

    /// Drop the whole record for `host`. Returns `true` if one existed.
    pub fn invalidate_host(&self, host: &str) -> bool {
        let existed = self.table.write().remove(&key(host)).is_some();
        if existed {
            tracing::debug!(host = %host, "invalidated host");
        }
        existed
    }

    /// Clear the entire table.
    pub fn reset(&self) {
        self.table.write().clear();
        tracing::debug!("host cache reset");
    }

    /// Snapshot of the record for `host`.
    pub fn lookup(&self, host: &str) -> Option<DomainRecord> {
        self.table.read().get(&key(host)).cloned()
    }

    /// Bump the failure counter of `raw_ip` under `host`.
    ///
    /// Returns the new count, or `None` if the node is not cached.
    pub fn record_failure(&self, host: &str, raw_ip: &str) -> Option<u32> {
        let mut table = self.table.write();
        let node = table.get_mut(&key(host))?.node_mut(raw_ip)?;
        node.failure_count = node.failure_count.saturating_add(1);
        Some(node.failure_count)
    }

    /// Cached host names.
    pub fn hosts(&self) -> Vec<String> {
        self.table
            .read()
            .values()
            .map(|r| r.host_name.clone())
            .collect()
    }

    /// Number of cached hosts.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl std::fmt::Debug for HostCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCache")
            .field("hosts", &self.len())
            .finish_non_exhaustive()
    }
}
