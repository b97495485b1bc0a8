//! Mutation coordinator: one write, then a consistent update of every bound cache key.
//!
//! After the write succeeds, each bound [`UpdateRule`] runs against its key's current value
//! and all results land in one [`CacheStore::set_batch`], so no listener sees a partially
//! updated set of views. A failed write leaves the cache untouched. In optimistic mode the
//! rules run before the write and the previous values are restored on failure.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use reqwest::Method;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{AppliedWrite, BatchUpdate, CacheKey, CacheStore, batch_update};
use crate::infra::fetcher::{FetchError, FetchRequest, Fetcher};

use super::rules::{MutationParams, UpdateRule, UpdateRuleBinding};

const METRIC_MUTATION_TOTAL: &str = "letterbox_mutation_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMethod {
    Post,
    Put,
    Delete,
}

impl MutationMethod {
    pub fn as_method(self) -> Method {
        match self {
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    /// DELETE requests carry no body.
    fn sends_body(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl fmt::Display for MutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// Identity of one write.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDescriptor {
    pub path: String,
    pub params: MutationParams,
}

impl MutationDescriptor {
    pub fn new(path: impl Into<String>, params: MutationParams) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }
}

/// Failure handed to `on_error` and returned from [`Mutation::mutate`].
#[derive(Debug, Clone, PartialEq)]
pub struct MutationError {
    pub error: FetchError,
    /// Human-readable summary for the admin UI.
    pub message: String,
}

impl From<FetchError> for MutationError {
    fn from(error: FetchError) -> Self {
        let message = error.user_message();
        Self { error, message }
    }
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MutationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub type SuccessCallback = Arc<dyn Fn(&Value) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&MutationError) + Send + Sync>;

#[derive(Clone, Debug)]
enum Target {
    None,
    Key {
        key: CacheKey,
        rule: Option<UpdateRule>,
    },
    Cache(Vec<UpdateRuleBinding>),
}

/// Configuration of one mutation hook: method, bound keys, token and callbacks.
#[derive(Clone)]
pub struct MutationConfig {
    method: MutationMethod,
    target: Target,
    token: Option<String>,
    optimistic: bool,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl MutationConfig {
    pub fn new(method: MutationMethod) -> Self {
        Self {
            method,
            target: Target::None,
            token: None,
            optimistic: false,
            on_success: None,
            on_error: None,
        }
    }

    /// Bind a single key; its rule is set with [`MutationConfig::on_update`].
    pub fn key(mut self, key: CacheKey) -> Self {
        let rule = match self.target {
            Target::Key { rule, .. } => rule,
            _ => None,
        };
        self.target = Target::Key { key, rule };
        self
    }

    /// Rule for the single bound key.
    pub fn on_update(mut self, update: UpdateRule) -> Self {
        if let Target::Key { rule, .. } = &mut self.target {
            *rule = Some(update);
        } else {
            warn!("on_update ignored: no single key is bound");
        }
        self
    }

    /// Bind several keys, each with its own rule. Replaces a single-key binding.
    pub fn cache(mut self, bindings: Vec<UpdateRuleBinding>) -> Self {
        self.target = Target::Cache(bindings);
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Apply rules before the write and roll back on failure.
    pub fn optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MutationError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn method(&self) -> MutationMethod {
        self.method
    }

    /// Every bound key in application order.
    pub fn bindings(&self) -> Vec<UpdateRuleBinding> {
        match &self.target {
            Target::None => Vec::new(),
            Target::Key { key, rule } => vec![UpdateRuleBinding {
                key: key.clone(),
                rule: rule.clone(),
                every_page: false,
            }],
            Target::Cache(bindings) => bindings.clone(),
        }
    }
}

impl fmt::Debug for MutationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationConfig")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("authenticated", &self.token.is_some())
            .field("optimistic", &self.optimistic)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl MutationCoordinator {
    pub fn new(store: Arc<CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { store, fetcher }
    }

    pub fn use_mutation(&self, config: MutationConfig) -> Mutation {
        Mutation {
            config,
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// A configured mutation hook.
///
/// Concurrent `mutate` calls are not serialized; `is_loading` stays true until all of them
/// settled.
pub struct Mutation {
    config: MutationConfig,
    store: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    pending: Arc<AtomicUsize>,
}

struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Mutation {
    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Issue the write and synchronize the bound cache keys.
    ///
    /// Callbacks run after the cache has been updated (or left alone) and after
    /// `is_loading` dropped back.
    #[instrument(
        skip(self, descriptor),
        fields(method = %self.config.method, path = %descriptor.path)
    )]
    pub async fn mutate(&self, descriptor: MutationDescriptor) -> Result<Value, MutationError> {
        let mutation_id = Uuid::new_v4();

        let Some(token) = self.config.token.clone() else {
            counter!(METRIC_MUTATION_TOTAL, "outcome" => "unauthorized").increment(1);
            warn!(%mutation_id, "Mutation rejected before sending: no token");
            return Err(self.fail(FetchError::Unauthorized));
        };

        let guard = PendingGuard::enter(&self.pending);
        let bindings = expand_pages(&self.store, self.config.bindings());
        let params = Arc::new(descriptor.params);

        let snapshot = if self.config.optimistic {
            self.store
                .set_batch(rule_updates(&bindings, &params, true))
        } else {
            Vec::new()
        };

        let request = FetchRequest {
            method: self.config.method.as_method(),
            target: descriptor.path,
            token: Some(token),
            body: self
                .config
                .method
                .sends_body()
                .then(|| Value::Object(params.as_ref().clone())),
        };

        match self.fetcher.request(request).await {
            Ok(data) => {
                let applied = if self.config.optimistic {
                    snapshot.len()
                } else {
                    self.store
                        .set_batch(rule_updates(&bindings, &params, false))
                        .len()
                };
                drop(guard);
                counter!(METRIC_MUTATION_TOTAL, "outcome" => "success").increment(1);
                info!(%mutation_id, updated_keys = applied, "Mutation succeeded");
                if let Some(callback) = &self.config.on_success {
                    callback(&data);
                }
                Ok(data)
            }
            Err(error) => {
                let restored = rollback(&self.store, snapshot);
                drop(guard);
                counter!(METRIC_MUTATION_TOTAL, "outcome" => "error").increment(1);
                warn!(%mutation_id, error = %error, restored_keys = restored, "Mutation failed");
                Err(self.fail(error))
            }
        }
    }

    fn fail(&self, error: FetchError) -> MutationError {
        let error = MutationError::from(error);
        if let Some(callback) = &self.config.on_error {
            callback(&error);
        }
        error
    }
}

/// Fan `every_page` bindings out to the other cached keys sharing their path.
fn expand_pages(store: &CacheStore, bindings: Vec<UpdateRuleBinding>) -> Vec<UpdateRuleBinding> {
    let mut expanded = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let pages = if binding.every_page {
            store.keys_with_path(binding.key.path())
        } else {
            Vec::new()
        };
        for key in pages {
            if key != binding.key {
                expanded.push(UpdateRuleBinding {
                    key,
                    rule: binding.rule.clone(),
                    every_page: false,
                });
            }
        }
        expanded.push(binding);
    }
    expanded
}

/// Batch writes for every binding that has a rule.
///
/// In optimistic mode only keys that already hold a value are touched, so a rollback can
/// always restore a concrete previous value.
fn rule_updates(
    bindings: &[UpdateRuleBinding],
    params: &Arc<MutationParams>,
    only_cached: bool,
) -> Vec<BatchUpdate> {
    bindings
        .iter()
        .filter_map(|binding| {
            let rule = binding.rule.clone()?;
            let params = Arc::clone(params);
            Some(batch_update(binding.key.clone(), move |previous| {
                if only_cached && previous.is_none() {
                    return None;
                }
                rule.apply(previous, &params)
            }))
        })
        .collect()
}

fn rollback(store: &CacheStore, snapshot: Vec<AppliedWrite>) -> usize {
    if snapshot.is_empty() {
        return 0;
    }
    let restores = snapshot
        .into_iter()
        .filter_map(|write| {
            let previous = write.previous?;
            Some(batch_update(write.key, move |_| Some(previous)))
        })
        .collect();
    store.set_batch(restores).len()
}
