//! One application instance: both coordinators over one cache store, plus the current token.

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheKey, CacheStore};
use crate::infra::fetcher::Fetcher;

use super::mutation::{Mutation, MutationConfig, MutationCoordinator};
use super::query::{QueryCoordinator, QueryDescriptor, QueryHandle};

/// Wires the coordinators to a shared store. The store itself is not exposed; consumers go
/// through [`Session::query`] and [`Session::mutation`].
///
/// The token is whatever the session provider handed out; reads pass it along when present,
/// writes without it fail before any request is made.
#[derive(Clone)]
pub struct Session {
    queries: QueryCoordinator,
    mutations: MutationCoordinator,
    token: Option<String>,
}

impl Session {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: CacheConfig, token: Option<String>) -> Self {
        let store = Arc::new(CacheStore::new());
        Self {
            queries: QueryCoordinator::new(Arc::clone(&store), Arc::clone(&fetcher), config),
            mutations: MutationCoordinator::new(store, fetcher),
            token,
        }
    }

    pub fn queries(&self) -> &QueryCoordinator {
        &self.queries
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.mutations
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Observe `key` with the session token.
    pub fn query(&self, key: CacheKey) -> QueryHandle {
        self.queries
            .use_query(QueryDescriptor::new(key, self.token.clone()))
    }

    /// Configure a mutation authorized with the session token.
    pub fn mutation(&self, config: MutationConfig) -> Mutation {
        self.mutations
            .use_mutation(config.token(self.token.clone()))
    }
}
