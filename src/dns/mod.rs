//! DNS Resolution Cache Module
//!
//! Provides the host-name resolution cache and everything around it:
//! - Address classification ([`classify`])
//! - The host cache itself ([`HostCache`])
//! - Coalesced resolve-and-cache ([`ResolutionCoordinator`])
//! - Policy-driven IP selection ([`selection::pick`])
//! - Pluggable resolver backends ([`GaiResolver`], [`HickoryResolver`])
//!
//! # Architecture
//!
//! The `Resolve` trait is the only boundary to the outside world. Everything
//! else is cache state and policy. Resolution results flow into the cache;
//! selection only ever reads from it.

pub mod cache;
pub mod classify;
pub mod coordinator;
mod gai;
mod hickory;
mod resolve;
pub mod selection;

pub use cache::{AddressNode, DomainRecord, HostCache};
pub use classify::{classify, IpVersion};
pub use coordinator::{Callback, CompletionQueue, ResolutionCoordinator, ResolveStatus};
pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use resolve::{Addrs, Name, Resolve, Resolving};
pub use selection::{LocaleProvider, SelectionStrategy, StaticLocale, SystemLocale};
