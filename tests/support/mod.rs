//! Scripted in-memory fetcher shared by the coordinator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use letterbox::application::MutationParams;
use letterbox::cache::CacheKey;
use letterbox::infra::fetcher::{FetchError, FetchRequest, Fetcher};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::oneshot;

type Outcome = Result<Value, FetchError>;

enum Scripted {
    Ready(Outcome),
    Gated(oneshot::Receiver<Outcome>),
}

/// Answers requests from per-route queues and records every call.
///
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    calls: Mutex<Vec<FetchRequest>>,
    scripts: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, target: &str, outcome: Outcome) {
        self.push(method, target, Scripted::Ready(outcome));
    }

    /// Queue a response that is held back until the returned sender fires.
    pub fn gate(&self, method: Method, target: &str) -> oneshot::Sender<Outcome> {
        let (sender, receiver) = oneshot::channel();
        self.push(method, target, Scripted::Gated(receiver));
        sender
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    /// Poll until `count` requests arrived; panics after about two seconds.
    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..2_000 {
            if self.call_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected {count} fetcher calls, saw {}", self.call_count());
    }

    fn push(&self, method: Method, target: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .entry((method, target.to_string()))
            .or_default()
            .push_back(scripted);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn request(&self, request: FetchRequest) -> Result<Value, FetchError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        let scripted = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(&(request.method.clone(), request.target.clone()))
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted::Ready(outcome)) => outcome,
            Some(Scripted::Gated(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err(FetchError::network("gate dropped"))),
            None => Err(FetchError::from_response(404, b"{\"message\":\"not scripted\"}")),
        }
    }
}

pub fn key(path: &str) -> CacheKey {
    CacheKey::from_path(path).expect("valid key")
}

pub fn params(value: Value) -> MutationParams {
    match value {
        Value::Object(fields) => fields,
        other => panic!("params must be an object, got {other}"),
    }
}

/// Read envelope around `data`.
pub fn envelope(data: Value) -> Outcome {
    Ok(serde_json::json!({ "data": data }))
}
