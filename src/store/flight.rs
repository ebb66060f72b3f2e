//! Per-key in-flight registry.
//!
//! The first caller that finds a key absent marks it pending inside the
//! same DashMap entry lock and becomes the only producer. Everyone arriving
//! before completion subscribes to the pending slot and receives the same
//! outcome.
//!
//! ```text
//! absent ──(entry lock)──> Pending(rx) ──ok──> Ready(v)
//!                               └──err──> absent (next call retries)
//! ```
//!
//! The producer future is spawned on tokio, so it runs to completion even if
//! the caller that started it is dropped.

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::error::{PipelineError, Result};

type Outcome<V> = Option<Result<V>>;

enum Slot<V> {
    Pending(watch::Receiver<Outcome<V>>),
    Ready(V),
}

enum Role<V> {
    Hit(V),
    Waiter(watch::Receiver<Outcome<V>>),
    Producer(watch::Sender<Outcome<V>>, watch::Receiver<Outcome<V>>),
}

/// Memoizing single-flight map.
pub struct SingleFlight<K, V> {
    slots: Arc<DashMap<K, Slot<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Completed value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.slots.get(key)?.value() {
            Slot::Ready(v) => Some(v.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Drop a completed value so the next call recomputes it. Pending
    /// slots are left alone.
    pub fn remove_ready(&self, key: &K) -> Option<V> {
        self.slots
            .remove_if(key, |_, slot| matches!(slot, Slot::Ready(_)))
            .and_then(|(_, slot)| match slot {
                Slot::Ready(v) => Some(v),
                Slot::Pending(_) => None,
            })
    }

    /// Number of pending and completed keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Return the memoized value, join an in-flight computation, or become
    /// the producer and run `init`.
    ///
    /// `init` is only called by the producer.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        // Check-and-mark happens under the entry lock, with no await inside.
        let role = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(v) => Role::Hit(v.clone()),
                Slot::Pending(rx) => Role::Waiter(rx.clone()),
            },
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::Pending(rx.clone()));
                Role::Producer(tx, rx)
            }
        };

        let rx = match role {
            Role::Hit(v) => return Ok(v),
            Role::Waiter(rx) => rx,
            Role::Producer(tx, rx) => {
                self.spawn_producer(key.clone(), tx, init());
                rx
            }
        };

        wait(rx, &key).await
    }

    fn spawn_producer<Fut>(&self, key: K, tx: watch::Sender<Outcome<V>>, fut: Fut)
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut guard = PendingGuard {
            slots: Arc::clone(&self.slots),
            key: Some(key),
        };
        tokio::spawn(async move {
            let outcome = fut.await;
            if let Some(key) = guard.key.take() {
                // Ready must be visible before waiters wake up.
                match &outcome {
                    Ok(v) => {
                        guard.slots.insert(key, Slot::Ready(v.clone()));
                    }
                    Err(_) => {
                        guard.slots.remove(&key);
                    }
                }
            }
            tx.send_replace(Some(outcome));
        });
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn wait<K: Display, V: Clone>(mut rx: watch::Receiver<Outcome<V>>, key: &K) -> Result<V> {
    let outcome = rx
        .wait_for(Option::is_some)
        .await
        .map(|outcome| (*outcome).clone());
    match outcome {
        Ok(Some(result)) => result,
        _ => Err(PipelineError::transform(
            key.to_string(),
            "producer task ended without a result",
        )),
    }
}

/// Clears a pending slot if the producer task unwinds before finishing.
struct PendingGuard<K: Eq + Hash, V> {
    slots: Arc<DashMap<K, Slot<V>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for PendingGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.slots
                .remove_if(&key, |_, slot| matches!(slot, Slot::Pending(_)));
        }
    }
}
