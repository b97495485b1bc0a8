//! Path-keyed cache store.
//!
//! Holds the last known value of every observed resource together with its status,
//! revision counter, and listeners. The store has no network awareness; it is mutated
//! only through [`CacheStore::set`], [`CacheStore::set_status`], and
//! [`CacheStore::set_batch`].
//!
//! Listeners run after the store lock is released, so a listener may read the store or
//! drop subscriptions (its own included) while being notified.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{trace, warn};

use crate::infra::fetcher::FetchError;

use super::keys::CacheKey;
use super::lock::{read_lock, write_lock};

const SOURCE: &str = "cache::store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Transitions reachable through `set_status`. Successful writes always land on `Ready`.
    fn accepts(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Ready | Self::Error, Self::Loading) | (Self::Loading, Self::Error)
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheEntry {
    pub value: Option<Value>,
    pub status: EntryStatus,
    pub error: Option<FetchError>,
    /// Incremented on every successful write.
    pub revision: u64,
    /// Pagination cursor of the last fetched page, if the API returned one.
    pub last_evaluated_key: Option<String>,
    pub updated_at: Option<Instant>,
}

impl CacheEntry {
    /// Time since the last successful write.
    pub fn age(&self) -> Option<Duration> {
        self.updated_at.map(|at| at.elapsed())
    }
}

pub type Listener = Arc<dyn Fn(&CacheKey, &CacheEntry) + Send + Sync>;

/// One keyed write inside [`CacheStore::set_batch`]. Returning `None` leaves the entry untouched.
pub type BatchUpdate = (
    CacheKey,
    Box<dyn FnOnce(Option<&Value>) -> Option<Value> + Send>,
);

/// Box a keyed batch write.
pub fn batch_update<F>(key: CacheKey, update: F) -> BatchUpdate
where
    F: FnOnce(Option<&Value>) -> Option<Value> + Send + 'static,
{
    (key, Box::new(update))
}

/// A write that [`CacheStore::set_batch`] actually applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedWrite {
    pub key: CacheKey,
    pub previous: Option<Value>,
    pub revision: u64,
}

struct Registration {
    id: u64,
    active: AtomicBool,
    listener: Listener,
}

#[derive(Default)]
struct Slot {
    entry: CacheEntry,
    listeners: Vec<Arc<Registration>>,
}

struct Notification {
    key: CacheKey,
    entry: CacheEntry,
    listeners: Vec<Arc<Registration>>,
}

impl Notification {
    fn capture(key: &CacheKey, slot: &Slot) -> Option<Self> {
        if slot.listeners.is_empty() {
            return None;
        }
        Some(Self {
            key: key.clone(),
            entry: slot.entry.clone(),
            listeners: slot.listeners.clone(),
        })
    }

    fn deliver(self) {
        for registration in &self.listeners {
            if registration.active.load(Ordering::SeqCst) {
                (registration.listener)(&self.key, &self.entry);
            }
        }
    }
}

/// A settled fetch whose listeners have not been notified yet.
#[must_use = "listeners only run on `notify`"]
pub(crate) struct Settlement {
    applied: bool,
    notification: Option<Notification>,
}

impl Settlement {
    fn discarded() -> Self {
        Self {
            applied: false,
            notification: None,
        }
    }

    pub(crate) fn applied(&self) -> bool {
        self.applied
    }

    /// Run the listeners. Returns whether the outcome was written.
    pub(crate) fn notify(self) -> bool {
        if let Some(notification) = self.notification {
            notification.deliver();
        }
        self.applied
    }
}

/// Session-scoped cache shared by every query and mutation of one application instance.
pub struct CacheStore {
    slots: RwLock<HashMap<CacheKey, Slot>>,
    next_listener_id: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Current entry for `key`, creating an idle one on first access.
    pub fn get(&self, key: &CacheKey) -> CacheEntry {
        if let Some(slot) = read_lock(&self.slots, SOURCE, "get").get(key) {
            return slot.entry.clone();
        }
        write_lock(&self.slots, SOURCE, "get.create")
            .entry(key.clone())
            .or_default()
            .entry
            .clone()
    }

    /// Current entry for `key` without creating one.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        read_lock(&self.slots, SOURCE, "peek")
            .get(key)
            .map(|slot| slot.entry.clone())
    }

    /// Replace the value of `key` with `updater(previous)` and mark it ready.
    ///
    /// Returns the new revision.
    pub fn set<F>(&self, key: &CacheKey, updater: F) -> u64
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let (revision, notification) = {
            let mut slots = write_lock(&self.slots, SOURCE, "set");
            let slot = slots.entry(key.clone()).or_default();
            let next = updater(slot.entry.value.as_ref());
            write_value(key, slot, next, None)
        };
        if let Some(notification) = notification {
            notification.deliver();
        }
        revision
    }

    /// Move `key` to `Loading` or `Error` without touching its value.
    ///
    /// Returns `false` when the transition is not allowed from the current status.
    pub fn set_status(
        &self,
        key: &CacheKey,
        status: EntryStatus,
        error: Option<FetchError>,
    ) -> bool {
        let notification = {
            let mut slots = write_lock(&self.slots, SOURCE, "set_status");
            let slot = slots.entry(key.clone()).or_default();
            let current = slot.entry.status;
            if current == EntryStatus::Loading && status == EntryStatus::Loading {
                return true;
            }
            if !current.accepts(status) {
                warn!(
                    key = %key,
                    from = current.as_str(),
                    to = status.as_str(),
                    "Rejected cache status transition"
                );
                return false;
            }
            let error = error.filter(|_| status == EntryStatus::Error);
            let changed = slot.entry.status != status || slot.entry.error != error;
            slot.entry.status = status;
            slot.entry.error = error;
            if changed {
                Notification::capture(key, slot)
            } else {
                None
            }
        };
        if let Some(notification) = notification {
            notification.deliver();
        }
        true
    }

    /// Apply several keyed writes under one lock; listeners run once all of them landed.
    pub fn set_batch(&self, updates: Vec<BatchUpdate>) -> Vec<AppliedWrite> {
        let mut applied = Vec::with_capacity(updates.len());
        let mut notifications = Vec::new();
        {
            let mut slots = write_lock(&self.slots, SOURCE, "set_batch");
            for (key, update) in updates {
                let slot = slots.entry(key.clone()).or_default();
                let Some(next) = update(slot.entry.value.as_ref()) else {
                    trace!(key = %key, "Batch update declined");
                    continue;
                };
                let previous = slot.entry.value.clone();
                let (revision, notification) = write_value(&key, slot, next, None);
                notifications.extend(notification);
                applied.push(AppliedWrite {
                    key,
                    previous,
                    revision,
                });
            }
        }
        for notification in notifications {
            notification.deliver();
        }
        applied
    }

    /// Settle a fetch that started at `expected_revision`.
    ///
    /// The outcome is discarded (returns `false`) when the entry has been written since.
    pub(crate) fn settle(
        &self,
        key: &CacheKey,
        expected_revision: u64,
        outcome: Result<(Value, Option<String>), FetchError>,
    ) -> bool {
        self.settle_deferred(key, expected_revision, outcome).notify()
    }

    /// Like [`CacheStore::settle`], but listeners only run on [`Settlement::notify`].
    ///
    /// Lets a caller settle while holding its own lock and notify after releasing it.
    pub(crate) fn settle_deferred(
        &self,
        key: &CacheKey,
        expected_revision: u64,
        outcome: Result<(Value, Option<String>), FetchError>,
    ) -> Settlement {
        let mut slots = write_lock(&self.slots, SOURCE, "settle");
        let slot = slots.entry(key.clone()).or_default();
        if slot.entry.revision != expected_revision {
            return Settlement::discarded();
        }
        let notification = match outcome {
            Ok((value, last_evaluated_key)) => {
                write_value(key, slot, value, Some(last_evaluated_key)).1
            }
            Err(error) => {
                if !slot.entry.status.accepts(EntryStatus::Error) {
                    return Settlement::discarded();
                }
                slot.entry.status = EntryStatus::Error;
                slot.entry.error = Some(error);
                Notification::capture(key, slot)
            }
        };
        Settlement {
            applied: true,
            notification,
        }
    }

    /// Register `listener` for changes of `key`. Dropping the subscription unregisters it.
    pub fn subscribe<F>(self: &Arc<Self>, key: &CacheKey, listener: F) -> Subscription
    where
        F: Fn(&CacheKey, &CacheEntry) + Send + Sync + 'static,
    {
        let registration = Arc::new(Registration {
            id: self.next_listener_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            listener: Arc::new(listener),
        });
        write_lock(&self.slots, SOURCE, "subscribe")
            .entry(key.clone())
            .or_default()
            .listeners
            .push(Arc::clone(&registration));
        Subscription {
            store: Arc::downgrade(self),
            key: key.clone(),
            registration,
        }
    }

    pub fn listener_count(&self, key: &CacheKey) -> usize {
        read_lock(&self.slots, SOURCE, "listener_count")
            .get(key)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Keys of every entry under `path`, whatever their query string, in key order.
    pub fn keys_with_path(&self, path: &str) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = read_lock(&self.slots, SOURCE, "keys_with_path")
            .keys()
            .filter(|key| key.path() == path)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Every entry ordered by key, for dumps and diagnostics.
    pub fn snapshot(&self) -> Vec<(CacheKey, CacheEntry)> {
        let mut entries: Vec<_> = read_lock(&self.slots, SOURCE, "snapshot")
            .iter()
            .map(|(key, slot)| (key.clone(), slot.entry.clone()))
            .collect();
        entries.sort_by(|(left, _), (right, _)| left.as_str().cmp(right.as_str()));
        entries
    }

    /// Number of entries created so far.
    pub fn len(&self) -> usize {
        read_lock(&self.slots, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_listener(&self, key: &CacheKey, id: u64) {
        if let Some(slot) = write_lock(&self.slots, SOURCE, "unsubscribe").get_mut(key) {
            slot.listeners.retain(|registration| registration.id != id);
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_value(
    key: &CacheKey,
    slot: &mut Slot,
    value: Value,
    last_evaluated_key: Option<Option<String>>,
) -> (u64, Option<Notification>) {
    let entry = &mut slot.entry;
    let mut changed = entry.status != EntryStatus::Ready || entry.error.is_some();
    changed |= entry.value.as_ref() != Some(&value);
    if let Some(cursor) = last_evaluated_key {
        changed |= entry.last_evaluated_key != cursor;
        entry.last_evaluated_key = cursor;
    }

    entry.value = Some(value);
    entry.status = EntryStatus::Ready;
    entry.error = None;
    entry.revision += 1;
    entry.updated_at = Some(Instant::now());

    let revision = entry.revision;
    trace!(key = %key, revision, changed, "Cache entry written");
    let notification = if changed {
        Notification::capture(key, slot)
    } else {
        None
    };
    (revision, notification)
}

/// Handle returned by [`CacheStore::subscribe`].
pub struct Subscription {
    store: Weak<CacheStore>,
    key: CacheKey,
    registration: Arc<Registration>,
}

impl Subscription {
    /// Stop receiving notifications. Safe to call repeatedly and from inside a listener.
    pub fn unsubscribe(&self) {
        if !self.registration.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.remove_listener(&self.key, self.registration.id);
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.registration.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
