//! # tether-broker
//!
//! Generic topic broker: fan-out of a value to zero-or-more subscribers
//! keyed by topic.
//!
//! The same structure serves two jobs in the framework: push delivery
//! (topic = push command, many subscribers) and request/response correlation
//! (topic = correlation id, one subscriber that cancels after one value).
//!
//! Publishing never blocks on a slow subscriber: a full sink gets a
//! background delivery task bound to the subscriber's cancellation scope,
//! so one stalled push listener cannot stall response correlation on the
//! same broker instance.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Subscription<V> {
    scope: CancellationToken,
    sink: mpsc::Sender<V>,
}

/// Topic-keyed publish/subscribe registry.
///
/// Cloning a `Broker` yields another handle to the same registry.
pub struct Broker<T, V> {
    subscribers: Arc<RwLock<HashMap<T, Vec<Subscription<V>>>>>,
}

impl<T, V> Clone for Broker<T, V> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T, V> Default for Broker<T, V>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, V> Broker<T, V>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `sink` under `topic`.
    ///
    /// The subscription is visible to every `publish` issued after this call
    /// returns, and is removed automatically once `scope` is cancelled —
    /// there is no explicit unsubscribe.
    pub fn subscribe(&self, scope: CancellationToken, topic: T, sink: mpsc::Sender<V>) {
        {
            let mut subs = self.subscribers.write();
            subs.entry(topic.clone()).or_default().push(Subscription {
                scope: scope.clone(),
                sink: sink.clone(),
            });
        }

        // Janitor removes the entry once the subscriber's scope ends.
        let registry = Arc::clone(&self.subscribers);
        drop(tokio::spawn(async move {
            scope.cancelled().await;
            let mut subs = registry.write();
            if let Some(list) = subs.get_mut(&topic) {
                list.retain(|s| !s.sink.same_channel(&sink));
                if list.is_empty() {
                    let _ = subs.remove(&topic);
                }
            }
        }));
    }

    /// Deliver `value` to every live subscriber of `topic`.
    ///
    /// Delivery is best-effort per subscriber: an immediately-acceptable
    /// sink receives the value synchronously; a full sink gets a background
    /// delivery task racing against its scope. `publish` itself never
    /// blocks. Subscribers whose scope already ended are skipped.
    pub fn publish(&self, topic: &T, value: V) {
        let subs = self.subscribers.read();
        let Some(list) = subs.get(topic) else {
            return;
        };

        for sub in list {
            if sub.scope.is_cancelled() {
                continue;
            }
            match sub.sink.try_send(value.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(v)) => {
                    // Spillover: keep trying in the background until the
                    // subscriber drains or its scope ends.
                    counter!("broker_spillover_total").increment(1);
                    debug!("subscriber sink full, spilling delivery to a task");
                    let scope = sub.scope.clone();
                    let sink = sub.sink.clone();
                    drop(tokio::spawn(async move {
                        tokio::select! {
                            () = scope.cancelled() => {}
                            _ = sink.send(v) => {}
                        }
                    }));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Number of topics with at least one subscription entry.
    pub fn topic_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of subscriptions registered under `topic`.
    pub fn subscriber_count_of(&self, topic: &T) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }
}
