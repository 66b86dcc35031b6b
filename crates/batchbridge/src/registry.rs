//! # Correlation Registry
//!
//! A bounded map from [`CorrelationId`] to the slot a caller is waiting on.
//!
//! Entries leave the registry in exactly one of three ways:
//!
//! * [`Registry::take`] when the collector routes a reply
//! * expiry once they are older than the TTL (the caller has long since timed out)
//! * eviction of the oldest entry when a new one would exceed the capacity
//!
//! Expired and evicted slots are dropped, which closes the caller's channel
//! instead of leaving it waiting on a reply that will never be routed.
//!
//! Every operation holds the inner lock for its whole duration, so the registry
//! stays consistent when the dispatch, collector and sweeper tasks run on
//! different threads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;
use crate::communication::CorrelationId;

/// Default bound on live entries
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Default lifetime of an unanswered entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Stale ids tolerated in the insertion order before it is compacted
const COMPACT_SLACK: usize = 1024;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no live entry for correlation id {0}")]
    NotFound(CorrelationId),
}

struct Entry<S> {
    slot: S,
    inserted: Instant,
}

struct Entries<S> {
    slots: HashMap<CorrelationId, Entry<S>>,
    /// Insertion order. Holds stale ids for entries already taken; those are
    /// skipped lazily and compacted away once they pile up.
    order: VecDeque<(CorrelationId, Instant)>,
}

impl<S> Entries<S> {
    fn is_live(&self, id: &CorrelationId, inserted: Instant) -> bool {
        self.slots
            .get(id)
            .is_some_and(|entry| entry.inserted == inserted)
    }

    fn compact(&mut self) {
        if self.order.len() > self.slots.len() * 2 + COMPACT_SLACK {
            let slots = &self.slots;
            self.order.retain(|(id, inserted)| {
                slots.get(id).is_some_and(|entry| entry.inserted == *inserted)
            });
        }
    }

    /// Remove the oldest live entry, returning its id.
    fn evict_oldest(&mut self) -> Option<CorrelationId> {
        while let Some((id, inserted)) = self.order.pop_front() {
            if self.is_live(&id, inserted) {
                self.slots.remove(&id);
                return Some(id);
            }
        }
        None
    }
}

/// TTL- and capacity-bounded correlation map.
///
/// ## Type Parameters
///
/// * `S` - The delivery slot stored per id
pub struct Registry<S> {
    inner: Mutex<Entries<S>>,
    capacity: usize,
    ttl: Duration,
}

impl<S> Registry<S> {
    /// Creates an empty registry. A zero capacity is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Entries {
                slots: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Registers `slot` under `id`, evicting the oldest entry if the registry is full.
    pub async fn put(&self, id: CorrelationId, slot: S) {
        let mut entries = self.inner.lock().await;
        if !entries.slots.contains_key(&id) {
            while entries.slots.len() >= self.capacity {
                match entries.evict_oldest() {
                    Some(evicted) => debug!(id = %evicted, "registry full; evicted oldest entry"),
                    None => break,
                }
            }
        }
        let inserted = Instant::now();
        entries.slots.insert(id, Entry { slot, inserted });
        entries.order.push_back((id, inserted));
        entries.compact();
    }

    /// Removes and returns the slot for `id`.
    ///
    /// Fails with [`RegistryError::NotFound`] if the id was never registered,
    /// was already taken, or has outlived the TTL.
    pub async fn take(&self, id: &CorrelationId) -> Result<S, RegistryError> {
        let mut entries = self.inner.lock().await;
        match entries.slots.remove(id) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Ok(entry.slot),
            _ => Err(RegistryError::NotFound(*id)),
        }
    }

    /// Drops every entry older than the TTL, returning how many were removed.
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.inner.lock().await;
        let mut evicted = 0;
        while let Some(&(id, inserted)) = entries.order.front() {
            let live = entries.is_live(&id, inserted);
            if live && inserted.elapsed() < self.ttl {
                break;
            }
            entries.order.pop_front();
            if live {
                entries.slots.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Drops every entry, closing all waiting callers' slots.
    pub async fn clear(&self) -> usize {
        let mut entries = self.inner.lock().await;
        let cleared = entries.slots.len();
        entries.slots.clear();
        entries.order.clear();
        cleared
    }

    /// Number of registered entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Periodically evicts expired entries until `running` is cleared.
pub(crate) async fn sweep_loop<S: Send>(
    registry: Arc<Registry<S>>,
    interval: Duration,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
) {
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = notifier.notified() => continue,
        }
        let evicted = registry.evict_expired().await;
        if evicted > 0 {
            debug!(evicted, "swept orphaned requests");
        }
    }
}
