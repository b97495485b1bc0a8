//! Query coordinator: fetch-or-serve reads through the shared cache.
//!
//! Every consumer of a key observes the same [`CacheStore`] entry. The first consumer of a
//! key without a ready entry starts one fetch; consumers arriving while it is in flight join
//! it instead of issuing another request. A fetch result is discarded when the entry was
//! written (e.g. by a mutation) after the fetch started, or when a fetch with a different
//! token replaced it while it was in flight.
//!
//! Fetches run as detached tasks, so dropping a [`QueryHandle`] only stops notifications;
//! the fetch still completes and fills the cache for other consumers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use letterbox_api_types::Envelope;
use metrics::counter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::cache::{
    CacheConfig, CacheEntry, CacheKey, CacheStore, EntryStatus, Subscription, mutex_lock,
};
use crate::infra::fetcher::{FetchError, FetchRequest, Fetcher};

const SOURCE: &str = "application::query";
const METRIC_CACHE_HIT: &str = "letterbox_query_cache_hit_total";
const METRIC_CACHE_MISS: &str = "letterbox_query_cache_miss_total";
const METRIC_DEDUP: &str = "letterbox_query_dedup_total";
const METRIC_STALE_DISCARD: &str = "letterbox_query_stale_discard_total";

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

/// Identity of a read. The token authorizes the request but is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub key: CacheKey,
    pub token: Option<String>,
}

impl QueryDescriptor {
    pub fn new(key: CacheKey, token: Option<String>) -> Self {
        Self { key, token }
    }

    /// Unauthenticated read.
    pub fn public(key: CacheKey) -> Self {
        Self { key, token: None }
    }
}

/// What a consumer renders for one key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    pub data: Option<Value>,
    pub is_loading: bool,
    pub error: Option<FetchError>,
    pub last_evaluated_key: Option<String>,
    pub revision: u64,
}

impl QueryState {
    fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            data: entry.value.clone(),
            is_loading: entry.status == EntryStatus::Loading,
            error: entry.error.clone(),
            last_evaluated_key: entry.last_evaluated_key.clone(),
            revision: entry.revision,
        }
    }

    /// Decode the cached data into a typed view.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data.clone().map(serde_json::from_value).transpose()
    }
}

struct InFlight {
    id: u64,
    token: Option<String>,
    fetch: SharedFetch,
}

struct Inner {
    store: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    config: CacheConfig,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    fetched_with: Mutex<HashMap<CacheKey, Option<String>>>,
    next_fetch_id: AtomicU64,
}

#[derive(Clone)]
pub struct QueryCoordinator {
    inner: Arc<Inner>,
}

impl QueryCoordinator {
    pub fn new(store: Arc<CacheStore>, fetcher: Arc<dyn Fetcher>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                fetcher,
                config,
                in_flight: Mutex::new(HashMap::new()),
                fetched_with: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    /// Observe `descriptor.key`, fetching it when there is no fresh entry.
    ///
    /// Fetches are spawned on the current Tokio runtime when there is one; otherwise they
    /// progress while [`QueryHandle::settled`] is awaited.
    #[instrument(skip(self, descriptor), fields(key = %descriptor.key))]
    pub fn use_query(&self, descriptor: QueryDescriptor) -> QueryHandle {
        let store = &self.inner.store;
        let (sender, state) = watch::channel(QueryState::from_entry(&store.get(&descriptor.key)));
        let sender = Arc::new(sender);

        let listener_sender = Arc::clone(&sender);
        let subscription = store.subscribe(&descriptor.key, move |_, entry| {
            listener_sender.send_replace(QueryState::from_entry(entry));
        });
        sender.send_replace(QueryState::from_entry(&store.get(&descriptor.key)));

        let pending = self.ensure_fresh(&descriptor);
        QueryHandle {
            key: descriptor.key,
            state,
            pending,
            subscription,
        }
    }

    /// Fetch `descriptor.key` regardless of freshness, joining a fetch already in flight.
    #[instrument(skip(self, descriptor), fields(key = %descriptor.key))]
    pub async fn revalidate(&self, descriptor: &QueryDescriptor) -> Result<Value, FetchError> {
        self.start_or_join(descriptor).await
    }

    fn ensure_fresh(&self, descriptor: &QueryDescriptor) -> Option<SharedFetch> {
        let entry = self.inner.store.get(&descriptor.key);
        let same_token = mutex_lock(&self.inner.fetched_with, SOURCE, "ensure_fresh")
            .get(&descriptor.key)
            .is_some_and(|token| *token == descriptor.token);

        let fresh = match entry.status {
            EntryStatus::Ready => {
                same_token && !entry.age().is_some_and(|age| self.inner.config.is_stale(age))
            }
            // Failures are not retried automatically; `revalidate` does that.
            EntryStatus::Error => same_token,
            EntryStatus::Idle | EntryStatus::Loading => false,
        };
        if fresh {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(key = %descriptor.key, status = %entry.status, "Serving cached entry");
            return None;
        }

        Some(self.start_or_join(descriptor))
    }

    fn start_or_join(&self, descriptor: &QueryDescriptor) -> SharedFetch {
        let key = &descriptor.key;
        let fetch = {
            let mut in_flight = mutex_lock(&self.inner.in_flight, SOURCE, "start_or_join");
            if let Some(existing) = in_flight.get(key) {
                if existing.token == descriptor.token {
                    counter!(METRIC_DEDUP).increment(1);
                    debug!(key = %key, fetch_id = existing.id, "Joined in-flight fetch");
                    return existing.fetch.clone();
                }
            }

            let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
            let revision = self.inner.store.get(key).revision;
            let request = FetchRequest::get(key.as_str(), descriptor.token.clone());
            let fetch = Arc::clone(&self.inner)
                .run_fetch(id, key.clone(), request, revision)
                .boxed()
                .shared();

            in_flight.insert(
                key.clone(),
                InFlight {
                    id,
                    token: descriptor.token.clone(),
                    fetch: fetch.clone(),
                },
            );
            mutex_lock(&self.inner.fetched_with, SOURCE, "start_or_join.token")
                .insert(key.clone(), descriptor.token.clone());
            counter!(METRIC_CACHE_MISS).increment(1);
            debug!(key = %key, fetch_id = id, revision, "Starting fetch");
            fetch
        };

        self.inner.store.set_status(key, EntryStatus::Loading, None);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(fetch.clone());
            }
            Err(_) => debug!(key = %key, "No runtime; fetch runs when awaited"),
        }
        fetch
    }
}

impl Inner {
    async fn run_fetch(
        self: Arc<Self>,
        id: u64,
        key: CacheKey,
        request: FetchRequest,
        revision: u64,
    ) -> Result<Value, FetchError> {
        let outcome = self
            .fetcher
            .request(request)
            .await
            .and_then(decode_envelope);

        // Only the key's current fetch may settle. A fetch replaced by one carrying a
        // different token must not overwrite the entry, whichever finishes first.
        let settlement = {
            let mut in_flight = mutex_lock(&self.in_flight, SOURCE, "run_fetch.settle");
            if in_flight.get(&key).is_some_and(|current| current.id == id) {
                in_flight.remove(&key);
                Some(self.store.settle_deferred(&key, revision, outcome.clone()))
            } else {
                None
            }
        };

        match settlement {
            Some(settlement) if settlement.applied() => {
                settlement.notify();
                info!(key = %key, fetch_id = id, ok = outcome.is_ok(), "Query fetch settled");
            }
            Some(_) => {
                counter!(METRIC_STALE_DISCARD).increment(1);
                warn!(
                    key = %key,
                    fetch_id = id,
                    started_at_revision = revision,
                    "Discarded stale query response"
                );
            }
            None => {
                counter!(METRIC_STALE_DISCARD).increment(1);
                warn!(key = %key, fetch_id = id, "Discarded response of superseded fetch");
            }
        }

        outcome.map(|(data, _)| data)
    }
}

fn decode_envelope(payload: Value) -> Result<(Value, Option<String>), FetchError> {
    serde_json::from_value::<Envelope>(payload)
        .map(|envelope| (envelope.data, envelope.last_evaluated_key))
        .map_err(|err| FetchError::parse(format!("expected a `data` envelope: {err}")))
}

/// A consumer's view of one key. Dropping it unsubscribes.
pub struct QueryHandle {
    key: CacheKey,
    state: watch::Receiver<QueryState>,
    pending: Option<SharedFetch>,
    subscription: Subscription,
}

impl QueryHandle {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Wait for the fetch this handle started or joined, then return the current state.
    pub async fn settled(&mut self) -> QueryState {
        if let Some(fetch) = self.pending.take() {
            // The outcome is already reflected in the cache entry.
            let _ = fetch.await;
        }
        self.state()
    }

    /// Wait for the next change of the entry. `None` once the handle is torn down.
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Stop observing the key. Also happens on drop.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }
}
