//! # hostcache
//!
//! A host-name resolution cache for network clients.
//!
//! `hostcache` remembers, per host name, the IP addresses it has learned
//! from resolution or from a bootstrap document, coalesces concurrent
//! resolutions of the same host, and picks one address per connection
//! according to a configurable policy (locale, address family, failure
//! history).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hostcache::DnsContext;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = DnsContext::new().unwrap();
//!     ctx.resolve("example.com").await;
//!     println!("connect to {}", ctx.pick("example.com"));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`dns`] - Cache, coordinator, selection policy and resolvers
//! - [`config`] - Bootstrap document loading
//! - [`client`] - The [`DnsContext`] facade
//!
//! ## Failure model
//!
//! Nothing here is fatal. Failed resolutions surface as a `false` callback,
//! failed bootstrap loads as `false` with an empty cache, and a selection
//! with no usable address returns the host name itself so the transport
//! can fall back to ordinary resolution.

pub mod base;
pub mod client;
pub mod config;
pub mod dns;

pub use base::neterror::NetError;
pub use client::{DnsContext, DnsContextBuilder};
pub use config::{BootstrapConfig, ConfigSource};
pub use dns::{HostCache, SelectionStrategy};
