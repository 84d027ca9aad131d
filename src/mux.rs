//! Shared-stream multiplexing with reference-counted teardown.
//!
//! Several independent consumers may watch the same logical resource at
//! once (two panels showing the live state of the same app, say). Opening
//! one streaming call per consumer would be wasteful and would multiply
//! server-side watches, so [`StreamMux`] keeps a registry keyed by
//! (context, resource): the first subscriber opens the underlying call,
//! later subscribers attach to it, and the call is torn down exactly when
//! the last subscriber cancels.
//!
//! The registry also remembers the most recent item seen on each shared
//! stream, so a late subscriber is caught up immediately instead of
//! waiting for the next push.
//!
//! The source of truth for entry state is a single mutex. The pump task
//! publishes each item (cache update plus fan-out send) while holding it,
//! and `subscribe` reads the cache and attaches its receiver while
//! holding it, so a concurrent subscriber sees any given item either in
//! the replay slot or on its receiver — never both, never neither.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::cancel::CancelHandle;
use crate::errors::StreamError;
use crate::transport::{ServerStream, StreamEvent};

/// Fan-out buffer per shared stream. Subscribers that fall further behind
/// than this observe a `Lagged` error instead of the missed items.
const FANOUT_CAPACITY: usize = 64;

/// Composite identity of one logical shared stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    context: &'static str,
    resource: String,
}

impl SubscriptionKey {
    fn new(context: &'static str, resource: &str) -> Self {
        Self {
            context,
            resource: resource.to_string(),
        }
    }
}

type Fanout<T> = broadcast::Sender<Result<T, StreamError>>;
type Updates<T> = broadcast::Receiver<Result<T, StreamError>>;

struct Entry<T> {
    /// Distinguishes this entry from a successor under the same key. A
    /// stale subscriber (from before a natural stream end) must not touch
    /// an entry it never subscribed to.
    epoch: u64,
    /// Live subscriber count. Only ever incremented by `subscribe` and
    /// decremented by a subscription's cancel.
    users: usize,
    /// Most recent item seen on the underlying stream.
    last: Option<T>,
    fanout: Fanout<T>,
    /// Cancels the underlying streaming call.
    cancel: CancelHandle,
}

type Registry<T> = HashMap<SubscriptionKey, Entry<T>>;

/// Keyed registry of shared streams.
///
/// Generic over the item type; hold one mux per multiplexed item type so
/// each call site gets a fully typed stream with no downcasts.
pub struct StreamMux<T> {
    registry: Arc<Mutex<Registry<T>>>,
    epochs: AtomicU64,
}

impl<T> Default for StreamMux<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamMux<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            epochs: AtomicU64::new(0),
        }
    }
}

impl<T: Clone + Send + 'static> StreamMux<T> {
    /// Attach to the shared stream for (context, resource), opening the
    /// underlying call via `open` only if no live entry exists.
    ///
    /// Returns the subscription handle and the last item the shared
    /// stream has observed, if any, so the caller can catch up
    /// synchronously.
    ///
    /// Must be called from within a tokio runtime: the first subscription
    /// for a key spawns the pump task that drives the underlying stream.
    pub fn subscribe<F>(
        &self,
        context: &'static str,
        resource: &str,
        open: F,
    ) -> (Subscription<T>, Option<T>)
    where
        F: FnOnce() -> ServerStream<T>,
    {
        let key = SubscriptionKey::new(context, resource);
        let mut registry = lock(&self.registry);

        if let Some(entry) = registry.get_mut(&key) {
            entry.users += 1;
            trace!(
                context,
                resource,
                users = entry.users,
                "attached to existing stream"
            );
            let subscription = Subscription::new(
                Arc::clone(&self.registry),
                key,
                entry.epoch,
                entry.fanout.subscribe(),
            );
            return (subscription, entry.last.clone());
        }

        // First subscriber: open the underlying call. The registry stays
        // locked across `open` so a racing subscriber for the same key
        // cannot open a second stream.
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed);
        let (fanout, updates) = broadcast::channel(FANOUT_CAPACITY);
        let stream = open();
        let cancel = stream.cancel_handle();
        debug!(context, resource, "opened shared stream");
        registry.insert(
            key.clone(),
            Entry {
                epoch,
                users: 1,
                last: None,
                fanout: fanout.clone(),
                cancel,
            },
        );
        drop(registry);

        let pump_registry = Arc::clone(&self.registry);
        let pump_key = key.clone();
        tokio::spawn(async move {
            pump(pump_registry, pump_key, epoch, stream, fanout).await;
        });

        let subscription = Subscription::new(Arc::clone(&self.registry), key, epoch, updates);
        (subscription, None)
    }
}

/// Drive one underlying stream: cache and fan out items, surface a
/// failing status, drop the registry entry on end of stream.
async fn pump<T: Clone + Send + 'static>(
    registry: Arc<Mutex<Registry<T>>>,
    key: SubscriptionKey,
    epoch: u64,
    mut stream: ServerStream<T>,
    fanout: Fanout<T>,
) {
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Item(item) => {
                // Cache update and fan-out happen under the lock; see the
                // module docs for the replay/receive exclusivity this buys.
                let mut registry = lock(&registry);
                if let Some(entry) = registry.get_mut(&key) {
                    if entry.epoch == epoch {
                        entry.last = Some(item.clone());
                    }
                }
                let _ = fanout.send(Ok(item));
            }
            StreamEvent::Status(status) => {
                debug!(
                    context = key.context,
                    resource = %key.resource,
                    %status,
                    "shared stream status"
                );
                if !status.is_ok() {
                    let _ = fanout.send(Err(StreamError::Status(status)));
                }
            }
            StreamEvent::End => break,
        }
    }

    // Natural end (or cancellation closed the channel): drop the entry
    // eagerly. A later subscribe under the same key starts a fresh stream
    // with no remembered value.
    let mut registry = lock(&registry);
    if registry.get(&key).is_some_and(|entry| entry.epoch == epoch) {
        registry.remove(&key);
        trace!(
            context = key.context,
            resource = %key.resource,
            "shared stream ended, entry dropped"
        );
    }
}

/// One consumer's attachment to a shared stream.
pub struct Subscription<T> {
    updates: Updates<T>,
    cancel: CancelHandle,
}

impl<T: Send + 'static> Subscription<T> {
    fn new(
        registry: Arc<Mutex<Registry<T>>>,
        key: SubscriptionKey,
        epoch: u64,
        updates: Updates<T>,
    ) -> Self {
        let cancel = CancelHandle::new(move || {
            release(&registry, &key, epoch);
        });
        Self { updates, cancel }
    }

    /// A handle that detaches this subscription. Idempotent; only the
    /// last detachment for a key tears the underlying stream down.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Take the update receiver, consuming the subscription. Cancel
    /// handles obtained beforehand stay valid.
    pub fn into_updates(self) -> Updates<T> {
        self.updates
    }
}

/// Drop one subscriber from an entry; tear the stream down at zero.
fn release<T>(registry: &Arc<Mutex<Registry<T>>>, key: &SubscriptionKey, epoch: u64) {
    let mut guard = lock(registry);
    let cancel = match guard.get_mut(key) {
        Some(entry) if entry.epoch == epoch => {
            entry.users -= 1;
            if entry.users == 0 {
                debug!(
                    context = key.context,
                    resource = %key.resource,
                    "last subscriber gone, closing shared stream"
                );
                guard.remove(key).map(|entry| entry.cancel)
            } else {
                trace!(
                    context = key.context,
                    resource = %key.resource,
                    users = entry.users,
                    "subscriber detached"
                );
                None
            }
        }
        // Entry gone (stream ended naturally) or replaced by a successor:
        // nothing to release, and the underlying call is not ours to close.
        _ => None,
    };
    drop(guard);
    if let Some(cancel) = cancel {
        cancel.cancel();
    }
}

fn lock<T>(registry: &Arc<Mutex<Registry<T>>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
