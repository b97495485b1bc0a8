//! Shared read/write flows; the resource modules only pick keys and bindings.

#![deny(clippy::all, clippy::pedantic)]

pub mod correspondences;
pub mod letters;
pub mod recipients;

use std::collections::BTreeMap;

use letterbox::application::admin::Resource;
use letterbox::application::{MutationConfig, MutationDescriptor, QueryState, Session};
use letterbox::cache::CacheKey;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::CliError;
use crate::print::print_json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListOutput {
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_evaluated_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteOutput {
    result: Value,
    /// Cached views after the write, by key.
    views: BTreeMap<String, Value>,
}

/// Observe `key` until its fetch settled; a failed fetch becomes the command's error.
async fn load(session: &Session, key: CacheKey) -> Result<QueryState, CliError> {
    let mut handle = session.query(key);
    let state = handle.settled().await;
    match state.error {
        Some(error) => Err(error.into()),
        None => Ok(state),
    }
}

pub(crate) async fn list(
    session: &Session,
    resource: &Resource,
    cursor: Option<&str>,
) -> Result<(), CliError> {
    let state = load(session, resource.list_key(cursor)?).await?;
    print_json(&ListOutput {
        data: state.data.unwrap_or(Value::Null),
        last_evaluated_key: state.last_evaluated_key,
    })
}

pub(crate) async fn show(session: &Session, resource: &Resource, id: &str) -> Result<(), CliError> {
    let state = load(session, resource.detail_key(id)?).await?;
    print_json(&state.data.unwrap_or(Value::Null))
}

/// Run a write against the views it is bound to.
///
/// With a token the bound views are loaded first, so the output shows them after the update
/// rules ran. Without one the write is rejected before anything is sent.
pub(crate) async fn write(
    session: &Session,
    config: MutationConfig,
    descriptor: MutationDescriptor,
) -> Result<(), CliError> {
    let keys: Vec<CacheKey> = config
        .bindings()
        .into_iter()
        .map(|binding| binding.key)
        .collect();

    if session.token().is_some() {
        for key in &keys {
            debug!(key = %key, "Loading bound view before write");
            load(session, key.clone()).await?;
        }
    }

    let mutation = session.mutation(config);
    let result = mutation.mutate(descriptor).await?;

    // Bound views were loaded above, so observing them again is a cache hit.
    let views = keys
        .into_iter()
        .filter_map(|key| {
            let name = key.as_str().to_string();
            session.query(key).state().data.map(|value| (name, value))
        })
        .collect();
    print_json(&WriteOutput { result, views })
}
