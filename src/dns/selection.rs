//! IP selection policy.
//!
//! Picks one cached address for a host according to a [`SelectionStrategy`].
//! Filters narrow the candidate list; when nothing survives, the host name
//! itself is returned so the transport layer falls back to ordinary
//! resolution. Selection never fails.

use crate::dns::cache::{AddressNode, HostCache};
use crate::dns::classify::IpVersion;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Filters applied when picking an address.
///
/// Read-only once handed to [`DnsContext`](crate::client::DnsContext); swap
/// it wholesale with `set_selection_strategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionStrategy {
    /// Keep only nodes whose locale matches the current country code.
    pub check_locale: bool,
    /// Keep only nodes of `preferred_ip_version`.
    pub check_ip_version: bool,
    /// Order candidates by ascending failure count before the pick.
    pub check_success_rate: bool,
    pub preferred_ip_version: IpVersion,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self {
            check_locale: false,
            check_ip_version: false,
            check_success_rate: false,
            preferred_ip_version: IpVersion::V4,
        }
    }
}

impl SelectionStrategy {
    /// Strategy with every filter disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the locale filter.
    pub fn with_locale(mut self) -> Self {
        self.check_locale = true;
        self
    }

    /// Enable the address family filter.
    pub fn with_ip_version(mut self, version: IpVersion) -> Self {
        self.check_ip_version = true;
        self.preferred_ip_version = version;
        self
    }

    /// Enable failure-count ordering.
    pub fn with_success_rate(mut self) -> Self {
        self.check_success_rate = true;
        self
    }
}

/// Source of the caller's current country code (e.g. `"US"`).
pub trait LocaleProvider: Send + Sync {
    fn country_code(&self) -> String;
}

impl<F> LocaleProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn country_code(&self) -> String {
        self()
    }
}

/// Fixed country code.
#[derive(Debug, Clone)]
pub struct StaticLocale(pub String);

impl StaticLocale {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl LocaleProvider for StaticLocale {
    fn country_code(&self) -> String {
        self.0.clone()
    }
}

/// Country code derived from the operating system locale.
///
/// `en-US` and `en_US.UTF-8` both yield `"US"`. A locale without a region
/// subtag yields an empty string, which matches no node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocale;

impl LocaleProvider for SystemLocale {
    fn country_code(&self) -> String {
        sys_locale::get_locale()
            .map(|tag| region_of(&tag))
            .unwrap_or_default()
    }
}

/// Extract the region subtag from a BCP 47 / POSIX locale string.
fn region_of(tag: &str) -> String {
    let tag = tag.split(['.', '@']).next().unwrap_or_default();
    tag.split(['-', '_'])
        .skip(1)
        .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|part| part.to_ascii_uppercase())
        .unwrap_or_default()
}

/// Pick one address for `host`, or return `host` unchanged.
pub fn pick(
    host: &str,
    cache: &HostCache,
    strategy: &SelectionStrategy,
    locale: &dyn LocaleProvider,
) -> String {
    let Some(record) = cache.lookup(host) else {
        return host.to_string();
    };
    let mut candidates: Vec<AddressNode> = record.nodes().to_vec();

    if strategy.check_locale {
        let country = locale.country_code();
        candidates.retain(|n| n.locale.as_deref() == Some(country.as_str()));
    }

    if strategy.check_ip_version {
        candidates.retain(|n| n.version == strategy.preferred_ip_version);
    }

    if candidates.is_empty() {
        tracing::debug!(host = %host, "no candidate survived selection filters");
        return host.to_string();
    }

    // The pick below is uniform over the whole sorted list, so this ordering
    // does not by itself favour low-failure nodes.
    if strategy.check_success_rate {
        candidates.sort_by_key(|n| n.failure_count);
    }

    let index = rand::thread_rng().gen_range(0..candidates.len());
    candidates.swap_remove(index).raw_ip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_of() {
        assert_eq!(region_of("en-US"), "US");
        assert_eq!(region_of("en_GB.UTF-8"), "GB");
        assert_eq!(region_of("zh-Hans-CN"), "CN");
        assert_eq!(region_of("de-de"), "DE");
        assert_eq!(region_of("fr"), "");
        assert_eq!(region_of("C"), "");
    }

    #[test]
    fn test_strategy_builder() {
        let s = SelectionStrategy::new()
            .with_locale()
            .with_ip_version(IpVersion::V6);
        assert!(s.check_locale);
        assert!(s.check_ip_version);
        assert!(!s.check_success_rate);
        assert_eq!(s.preferred_ip_version, IpVersion::V6);
    }

    #[test]
    fn test_strategy_deserialize_partial() {
        let json = r#"{"check_ip_version": true, "preferred_ip_version": "ipv6"}"#;
        let s: SelectionStrategy = serde_json::from_str(json).unwrap();
        assert!(s.check_ip_version);
        assert!(!s.check_locale);
        assert_eq!(s.preferred_ip_version, IpVersion::V6);
    }

    #[test]
    fn test_pick_unknown_host_falls_back() {
        let cache = HostCache::new();
        let strategy = SelectionStrategy::new();
        let picked = pick("unknown.example", &cache, &strategy, &SystemLocale);
        assert_eq!(picked, "unknown.example");
    }

    #[test]
    fn test_pick_single_node() {
        let cache = HostCache::new();
        cache.upsert_address("a.com", "10.0.0.1");
        let picked = pick("a.com", &cache, &SelectionStrategy::new(), &SystemLocale);
        assert_eq!(picked, "10.0.0.1");
    }

    #[test]
    fn test_locale_filter_drops_untagged_nodes() {
        let cache = HostCache::new();
        cache.upsert_address("a.com", "10.0.0.1");
        let strategy = SelectionStrategy::new().with_locale();

        let picked = pick("a.com", &cache, &strategy, &StaticLocale::new("US"));
        assert_eq!(picked, "a.com");
    }

    #[test]
    fn test_closure_locale_provider() {
        let provider = || "JP".to_string();
        assert_eq!(provider.country_code(), "JP");
    }
}
