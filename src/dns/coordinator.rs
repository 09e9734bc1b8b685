//! Resolve-and-cache pipeline with per-host request coalescing.
//!
//! At most one resolution is in flight per host. A request for a host that
//! already has one pending joins it: the resolver runs once and every
//! joined callback receives the same outcome. Callbacks run on a
//! [`CompletionQueue`] thread, never on the task driving the resolver.
//!
//! There is no timeout or cancellation. A resolver future that never
//! completes keeps its host pending for as long as its task is alive. If
//! the task itself is dropped (for example because its runtime shut down),
//! the host's waiters receive `false` and the slot is released.

use crate::base::neterror::NetError;
use crate::dns::cache::HostCache;
use crate::dns::resolve::{Name, Resolve};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

/// Completion callback; receives `true` when addresses were cached.
pub type Callback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Callbacks waiting on one host. The mutex only makes the boxes `Sync`.
type Waiters = Vec<Mutex<Callback>>;

/// Default cap on concurrently pending hosts.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Dedicated thread that runs completion callbacks in submission order.
///
/// The thread exits once every handle to the queue has been dropped.
#[derive(Clone)]
pub struct CompletionQueue {
    tx: mpsc::UnboundedSender<(Callback, bool)>,
}

impl CompletionQueue {
    /// Spawn the completion thread.
    pub fn new() -> Result<Self, NetError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Callback, bool)>();

        std::thread::Builder::new()
            .name("hostcache-completion".into())
            .spawn(move || {
                while let Some((callback, ok)) = rx.blocking_recv() {
                    if std::panic::catch_unwind(AssertUnwindSafe(|| callback(ok))).is_err() {
                        tracing::error!("resolution callback panicked");
                    }
                }
            })
            .map_err(|e| {
                tracing::error!(error = %e, "failed to spawn completion thread");
                NetError::CompletionQueueUnavailable
            })?;

        Ok(Self { tx })
    }

    /// Queue `callback` to be invoked with `ok`.
    pub fn deliver(&self, callback: Callback, ok: bool) {
        if let Err(mpsc::error::SendError((callback, ok))) = self.tx.send((callback, ok)) {
            // Completion thread is gone; still honour exactly-once delivery.
            tracing::warn!("completion queue closed, running callback inline");
            callback(ok);
        }
    }
}

impl std::fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// What `resolve_and_cache` did with a request.
#[derive(Debug, Clone)]
pub enum ResolveStatus {
    /// A new resolution was started.
    Started,
    /// The request joined the resolution already pending for its host.
    Joined,
    /// No resolution was attempted; the callback receives `false`.
    Rejected(NetError),
}

/// Drives the external resolver and feeds successful results into the cache.
#[derive(Clone)]
pub struct ResolutionCoordinator {
    cache: HostCache,
    resolver: Arc<dyn Resolve>,
    pending: Arc<DashMap<String, Waiters>>,
    active: Arc<AtomicUsize>,
    completions: CompletionQueue,
    max_in_flight: usize,
}

impl ResolutionCoordinator {
    pub fn new(
        cache: HostCache,
        resolver: Arc<dyn Resolve>,
        completions: CompletionQueue,
        max_in_flight: usize,
    ) -> Self {
        Self {
            cache,
            resolver,
            pending: Arc::new(DashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            completions,
            max_in_flight,
        }
    }

    /// Resolve `host` and merge the result into the cache.
    ///
    /// Returns immediately. `on_complete` is invoked exactly once, on the
    /// completion queue. Must be called from within a Tokio runtime for a
    /// resolution to start; otherwise the request is rejected.
    pub fn resolve_and_cache<F>(&self, host: &str, on_complete: F) -> ResolveStatus
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let on_complete: Callback = Box::new(on_complete);

        if host.is_empty() {
            return self.reject(on_complete, NetError::InvalidHost);
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(host = %host, "no async runtime, resolution not started");
            return self.reject(on_complete, NetError::NameResolutionFailed);
        };

        let key = host.to_ascii_lowercase();
        let slot = match self.pending.entry(key.clone()) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(Mutex::new(on_complete));
                tracing::debug!(
                    host = %host,
                    waiters = waiters.get().len(),
                    "joined pending resolution"
                );
                return ResolveStatus::Joined;
            }
            Entry::Vacant(vacant) => {
                if self.active.fetch_add(1, Ordering::SeqCst) >= self.max_in_flight {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    drop(vacant);
                    tracing::warn!(
                        host = %host,
                        limit = self.max_in_flight,
                        "resolver queue full"
                    );
                    return self.reject(on_complete, NetError::HostResolverQueueTooLarge);
                }
                // Registered before the resolver is spawned, so the result
                // always finds its waiters.
                vacant.insert(vec![Mutex::new(on_complete)]);
                PendingSlot {
                    coordinator: self.clone(),
                    key,
                    outcome: None,
                }
            }
        };

        tracing::debug!(host = %host, "starting resolution");
        runtime.spawn(slot.resolve(host.to_string()));
        ResolveStatus::Started
    }

    /// Resolve `host` and wait for the outcome.
    pub async fn resolve(&self, host: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        self.resolve_and_cache(host, move |ok| {
            let _ = tx.send(ok);
        });
        rx.await.unwrap_or(false)
    }

    /// Whether a resolution for `host` is pending.
    pub fn is_pending(&self, host: &str) -> bool {
        self.pending.contains_key(&host.to_ascii_lowercase())
    }

    /// Number of hosts with a pending resolution.
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn reject(&self, on_complete: Callback, reason: NetError) -> ResolveStatus {
        self.completions.deliver(on_complete, false);
        ResolveStatus::Rejected(reason)
    }
}

impl std::fmt::Debug for ResolutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCoordinator")
            .field("in_flight", &self.in_flight())
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

/// One host's claim on an in-flight slot.
///
/// Owned by the spawned resolution task. Dropping it releases the slot and
/// serves every waiter, with `false` unless an outcome was recorded, so a
/// task dropped before it finishes still completes its callbacks.
struct PendingSlot {
    coordinator: ResolutionCoordinator,
    key: String,
    outcome: Option<bool>,
}

impl PendingSlot {
    async fn resolve(mut self, host: String) {
        let name = Name::new(host.as_str());
        let lookup = AssertUnwindSafe(self.coordinator.resolver.resolve(name))
            .catch_unwind()
            .await;

        let ok = match lookup {
            Ok(Ok(addrs)) => {
                let literals: Vec<String> = addrs.map(|ip| ip.to_string()).collect();
                if literals.is_empty() {
                    tracing::warn!(host = %host, "resolver returned no addresses");
                    false
                } else {
                    for ip in &literals {
                        self.coordinator.cache.upsert_address(&host, ip);
                    }
                    tracing::debug!(host = %host, count = literals.len(), "resolution cached");
                    true
                }
            }
            Ok(Err(e)) if e.is_resolution_error() => {
                tracing::debug!(host = %host, error = %e, code = e.as_i32(), "name not resolved");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(host = %host, error = %e, code = e.as_i32(), "resolver failed");
                false
            }
            Err(_) => {
                tracing::error!(host = %host, "resolver panicked");
                false
            }
        };

        self.outcome = Some(ok);
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        let coordinator = &self.coordinator;

        // The count drops before the entry so a full cap never rejects a new
        // host on account of a slot that has already finished.
        coordinator.active.fetch_sub(1, Ordering::SeqCst);
        let waiters = coordinator
            .pending
            .remove(&self.key)
            .map(|(_, waiters)| waiters)
            .unwrap_or_default();

        let ok = match self.outcome {
            Some(ok) => ok,
            None => {
                tracing::warn!(host = %self.key, waiters = waiters.len(), "resolution abandoned");
                false
            }
        };

        for callback in waiters {
            coordinator.completions.deliver(callback.into_inner(), ok);
        }
    }
}
