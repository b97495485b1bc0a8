//! Coordinators on top of the cache store, plus the admin resource bindings.

pub mod admin;
pub mod error;
pub mod mutation;
pub mod query;
pub mod rules;
pub mod session;

pub use mutation::{
    Mutation, MutationConfig, MutationCoordinator, MutationDescriptor, MutationError,
    MutationMethod,
};
pub use query::{QueryCoordinator, QueryDescriptor, QueryHandle, QueryState};
pub use rules::{MutationParams, UpdateRule, UpdateRuleBinding};
pub use session::Session;
