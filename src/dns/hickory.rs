//! Resolver backend built on hickory-dns.
//!
//! Queries name servers directly instead of going through `getaddrinfo`.
//! Both address families are requested, so a record learned this way
//! carries IPv4 and IPv6 nodes for version-preferring selection.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, ResolverBuilder, TokioResolver};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;

/// [`Resolve`] implementation over a hickory [`TokioResolver`].
///
/// Clones share one resolver and its record cache.
///
/// ```rust,ignore
/// let ctx = DnsContext::builder()
///     .resolver(Arc::new(HickoryResolver::new()))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    inner: Arc<TokioResolver>,
}

impl HickoryResolver {
    /// Resolver using the system configuration, or hickory's defaults when
    /// that cannot be read.
    pub fn new() -> Self {
        let builder = match TokioResolver::builder_tokio() {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "system resolver config unreadable");
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            }
        };
        Self::from_builder(builder)
    }

    /// Resolver querying only the name servers listed in `config`.
    pub fn with_config(config: ResolverConfig) -> Self {
        let provider = TokioConnectionProvider::default();
        Self::from_builder(TokioResolver::builder_with_config(config, provider))
    }

    fn from_builder(mut builder: ResolverBuilder<TokioConnectionProvider>) -> Self {
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        Self {
            inner: Arc::new(builder.build()),
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_error(domain: &str, e: ResolveError) -> NetError {
    let kind = if e.is_no_records_found() {
        io::ErrorKind::NotFound
    } else {
        io::ErrorKind::Other
    };
    NetError::dns_failed(domain, io::Error::new(kind, e))
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let inner = self.inner.clone();
        Box::pin(async move {
            let domain = name.as_str();
            let lookup = match inner.lookup_ip(domain).await {
                Ok(lookup) => lookup,
                Err(e) => {
                    tracing::debug!(domain, error = %e, "hickory lookup failed");
                    return Err(lookup_error(domain, e));
                }
            };

            let addrs: Vec<IpAddr> = lookup.iter().collect();
            if addrs.is_empty() {
                let empty = io::Error::new(io::ErrorKind::NotFound, "no addresses returned");
                return Err(NetError::dns_failed(domain, empty));
            }

            tracing::debug!(domain, count = addrs.len(), "hickory lookup complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
