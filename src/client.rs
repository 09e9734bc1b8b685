//! Resolution cache context with builder pattern.
//!
//! [`DnsContext`] bundles the host cache, the resolution coordinator and the
//! selection policy behind the operations application code uses. Construct
//! one at startup and share it (it is cheap to clone); separate contexts
//! never share state, which keeps tests isolated.
//!
//! # Example
//!
//! ```rust,ignore
//! use hostcache::{DnsContext, SelectionStrategy};
//! use hostcache::dns::IpVersion;
//!
//! let ctx = DnsContext::builder()
//!     .selection_strategy(SelectionStrategy::new().with_ip_version(IpVersion::V4))
//!     .build()?;
//!
//! ctx.resolve("api.example.com").await;
//! let target = ctx.resolve_ip_for_url(&"https://api.example.com/v1".parse()?);
//! ```

use crate::base::neterror::NetError;
use crate::config::{self, ConfigSource};
use crate::dns::cache::{DomainRecord, HostCache};
use crate::dns::coordinator::{
    CompletionQueue, ResolutionCoordinator, ResolveStatus, DEFAULT_MAX_IN_FLIGHT,
};
use crate::dns::selection::{self, LocaleProvider, SelectionStrategy, SystemLocale};
use crate::dns::{GaiResolver, Resolve};
use boring::ssl::SslConnector;
use parking_lot::RwLock;
use std::sync::Arc;
use url::{Host, Url};

/// Host resolution cache and IP selection engine.
///
/// Use [`DnsContext::builder()`] to configure and create a context.
#[derive(Clone)]
pub struct DnsContext {
    cache: HostCache,
    coordinator: ResolutionCoordinator,
    strategy: Arc<RwLock<SelectionStrategy>>,
    locale: Arc<dyn LocaleProvider>,
    bootstrap_tls: Option<SslConnector>,
}

impl DnsContext {
    /// Create a context with default settings.
    pub fn new() -> Result<Self, NetError> {
        Self::builder().build()
    }

    /// Create a new context builder.
    pub fn builder() -> DnsContextBuilder {
        DnsContextBuilder::default()
    }

    /// Underlying cache handle.
    pub fn cache(&self) -> &HostCache {
        &self.cache
    }

    /// Record `ip` as an address of `host`.
    pub fn update_mapping(&self, ip: &str, host: &str) -> bool {
        self.cache.upsert_address(host, ip)
    }

    /// Forget `ip` for every host.
    pub fn invalidate_ip(&self, ip: &str) -> usize {
        self.cache.invalidate_ip(ip)
    }

    /// Forget everything known about `host`.
    pub fn invalidate_host(&self, host: &str) -> bool {
        self.cache.invalidate_host(host)
    }

    /// Clear the cache.
    pub fn reset(&self) {
        self.cache.reset();
    }

    /// Snapshot of the record for `host`.
    pub fn lookup(&self, host: &str) -> Option<DomainRecord> {
        self.cache.lookup(host)
    }

    /// Count a connection failure against `ip` for `host`.
    pub fn record_failure(&self, host: &str, ip: &str) -> Option<u32> {
        self.cache.record_failure(host, ip)
    }

    /// Resolve `host` in the background; see
    /// [`ResolutionCoordinator::resolve_and_cache`].
    pub fn resolve_and_cache<F>(&self, host: &str, on_complete: F) -> ResolveStatus
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.coordinator.resolve_and_cache(host, on_complete)
    }

    /// Resolve `host` and wait for the outcome.
    pub async fn resolve(&self, host: &str) -> bool {
        self.coordinator.resolve(host).await
    }

    /// Whether a resolution for `host` is pending.
    pub fn is_pending(&self, host: &str) -> bool {
        self.coordinator.is_pending(host)
    }

    /// Replace the strategy used by subsequent picks.
    pub fn set_selection_strategy(&self, strategy: SelectionStrategy) {
        *self.strategy.write() = strategy;
    }

    /// Strategy currently in effect.
    pub fn selection_strategy(&self) -> SelectionStrategy {
        *self.strategy.read()
    }

    /// Pick the address to connect to for `host`, or `host` itself.
    pub fn pick(&self, host: &str) -> String {
        let strategy = self.selection_strategy();
        selection::pick(host, &self.cache, &strategy, self.locale.as_ref())
    }

    /// Pick the address to connect to for the host of `url`.
    ///
    /// A host that is already an IP literal is returned as-is (without
    /// brackets for IPv6). Returns `None` for URLs without a host.
    pub fn resolve_ip_for_url(&self, url: &Url) -> Option<String> {
        match url.host()? {
            Host::Domain(domain) => Some(self.pick(domain)),
            Host::Ipv4(ip) => Some(ip.to_string()),
            Host::Ipv6(ip) => Some(ip.to_string()),
        }
    }

    /// Replace the cache with a bootstrap document; `false` leaves it empty.
    pub async fn load_configuration(&self, source: &ConfigSource) -> bool {
        config::log_outcome(self.try_load_configuration(source).await)
    }

    /// Like [`load_configuration`](Self::load_configuration), with the error.
    pub async fn try_load_configuration(&self, source: &ConfigSource) -> Result<usize, NetError> {
        match &self.bootstrap_tls {
            Some(tls) => config::try_load_configuration_with(&self.cache, source, tls).await,
            None => config::try_load_configuration(&self.cache, source).await,
        }
    }
}

impl std::fmt::Debug for DnsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsContext")
            .field("cache", &self.cache)
            .field("coordinator", &self.coordinator)
            .field("strategy", &self.selection_strategy())
            .finish_non_exhaustive()
    }
}

/// Builder for creating a [`DnsContext`].
#[derive(Default)]
pub struct DnsContextBuilder {
    resolver: Option<Arc<dyn Resolve>>,
    locale: Option<Arc<dyn LocaleProvider>>,
    strategy: Option<SelectionStrategy>,
    max_in_flight: Option<usize>,
    cache: Option<HostCache>,
    bootstrap_tls: Option<SslConnector>,
}

impl DnsContextBuilder {
    /// Set the resolver backend (default: [`GaiResolver`]).
    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the locale provider (default: [`SystemLocale`]).
    pub fn locale_provider(mut self, locale: Arc<dyn LocaleProvider>) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Set the initial selection strategy.
    pub fn selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Cap the number of hosts resolving at once.
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Use an existing cache instead of a fresh one.
    pub fn cache(mut self, cache: HostCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// TLS connector for `https://` bootstrap documents.
    ///
    /// Defaults to [`config::default_tls_connector`], which trusts the
    /// system store.
    pub fn bootstrap_tls(mut self, connector: SslConnector) -> Self {
        self.bootstrap_tls = Some(connector);
        self
    }

    /// Build the context. Fails only if the completion thread cannot start.
    pub fn build(self) -> Result<DnsContext, NetError> {
        let cache = self.cache.unwrap_or_default();
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(GaiResolver::new()));
        let coordinator = ResolutionCoordinator::new(
            cache.clone(),
            resolver,
            CompletionQueue::new()?,
            self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT),
        );

        Ok(DnsContext {
            cache,
            coordinator,
            strategy: Arc::new(RwLock::new(self.strategy.unwrap_or_default())),
            locale: self.locale.unwrap_or_else(|| Arc::new(SystemLocale)),
            bootstrap_tls: self.bootstrap_tls,
        })
    }
}
