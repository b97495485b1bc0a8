mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use letterbox::application::admin::letters::{self, LETTERS};
use letterbox::application::rules::{remove_where, replace_with_params};
use letterbox::application::{
    MutationConfig, MutationCoordinator, MutationDescriptor, MutationMethod, QueryCoordinator,
    QueryDescriptor, UpdateRuleBinding,
};
use letterbox::cache::{CacheConfig, CacheStore};
use letterbox::infra::fetcher::FetchError;
use reqwest::Method;
use serde_json::{Value, json};

use support::{ScriptedFetcher, envelope, key, params};

fn coordinator(fetcher: &Arc<ScriptedFetcher>) -> (Arc<CacheStore>, MutationCoordinator) {
    let store = Arc::new(CacheStore::new());
    let mutations = MutationCoordinator::new(Arc::clone(&store), fetcher.clone());
    (store, mutations)
}

fn delete_letter(id: &str) -> MutationDescriptor {
    MutationDescriptor::new(format!("/letter/{id}"), params(json!({ "letterId": id })))
}

fn seed_letter_views(store: &CacheStore) {
    store.set(&key("/letter"), |_| {
        json!([{ "letterId": "l1" }, { "letterId": "l2" }])
    });
    store.set(&key("/correspondence/c1"), |_| {
        json!({
            "correspondenceId": "c1",
            "letters": [{ "letterId": "l1" }, { "letterId": "l3" }]
        })
    });
}

#[tokio::test]
async fn delete_filters_bound_list() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/letter/l1", Ok(json!({})));
    let (store, mutations) = coordinator(&fetcher);
    store.set(&key("/letter"), |_| {
        json!([{ "letterId": "l1" }, { "letterId": "l2" }])
    });

    let mutation = mutations.use_mutation(
        MutationConfig::new(MutationMethod::Delete)
            .key(key("/letter"))
            .on_update(remove_where("letterId"))
            .token(Some("t1".to_string())),
    );
    mutation.mutate(delete_letter("l1")).await.expect("delete");

    assert_eq!(
        store.get(&key("/letter")).value,
        Some(json!([{ "letterId": "l2" }]))
    );
    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::DELETE);
    assert_eq!(calls[0].token.as_deref(), Some("t1"));
    assert!(calls[0].body.is_none());
}

#[tokio::test]
async fn delete_reaches_later_cached_pages() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/letter/l3", Ok(json!({})));
    let (store, mutations) = coordinator(&fetcher);
    let second_page = LETTERS.list_key(Some("l2")).expect("page key");
    store.set(&key("/letter"), |_| {
        json!([{ "letterId": "l1" }, { "letterId": "l2" }])
    });
    store.set(&second_page, |_| {
        json!([{ "letterId": "l3" }, { "letterId": "l4" }])
    });

    let delete = mutations.use_mutation(
        letters::delete(None)
            .expect("bindings")
            .token(Some("t1".to_string())),
    );
    delete
        .mutate(LETTERS.delete_descriptor("l3"))
        .await
        .expect("delete");

    assert_eq!(
        store.get(&second_page).value,
        Some(json!([{ "letterId": "l4" }]))
    );
    assert_eq!(
        store.get(&key("/letter")).value,
        Some(json!([{ "letterId": "l1" }, { "letterId": "l2" }]))
    );
}

#[tokio::test]
async fn successful_delete_updates_every_bound_view() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/letter/l1", Ok(json!({})));
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);

    let config = letters::delete(Some("c1")).expect("bindings");
    let mutation = mutations.use_mutation(config.token(Some("t1".to_string())));
    mutation
        .mutate(LETTERS.delete_descriptor("l1"))
        .await
        .expect("delete");

    let list = store.get(&key("/letter")).value.expect("list");
    let detail = store.get(&key("/correspondence/c1")).value.expect("detail");
    assert_eq!(list, json!([{ "letterId": "l2" }]));
    assert_eq!(detail["letters"], json!([{ "letterId": "l3" }]));
}

#[tokio::test]
async fn failed_delete_leaves_every_bound_view_unchanged() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(
        Method::DELETE,
        "/letter/l1",
        Err(FetchError::from_response(500, br#"{"message":"boom"}"#)),
    );
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);
    let before_list = store.get(&key("/letter"));
    let before_detail = store.get(&key("/correspondence/c1"));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    let config = letters::delete(Some("c1"))
        .expect("bindings")
        .token(Some("t1".to_string()))
        .on_error(move |error| seen.lock().expect("errors lock").push(error.message.clone()));
    let mutation = mutations.use_mutation(config);

    let err = mutation
        .mutate(LETTERS.delete_descriptor("l1"))
        .await
        .expect_err("server failure");

    assert_eq!(err.error.status(), Some(500));
    let after_list = store.get(&key("/letter"));
    let after_detail = store.get(&key("/correspondence/c1"));
    assert_eq!(after_list.value, before_list.value);
    assert_eq!(after_list.revision, before_list.revision);
    assert_eq!(after_detail.value, before_detail.value);
    assert_eq!(after_detail.revision, before_detail.revision);
    assert_eq!(errors.lock().expect("errors lock").len(), 1);
}

#[tokio::test]
async fn missing_token_never_reaches_the_fetcher() {
    let fetcher = ScriptedFetcher::new();
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);

    let reported = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&reported);
    let config = letters::delete(Some("c1"))
        .expect("bindings")
        .optimistic(true)
        .on_error(move |error| *slot.lock().expect("report lock") = Some(error.clone()));
    let mutation = mutations.use_mutation(config);

    let err = mutation
        .mutate(LETTERS.delete_descriptor("l1"))
        .await
        .expect_err("unauthorized");

    assert_eq!(err.error, FetchError::Unauthorized);
    assert_eq!(fetcher.call_count(), 0);
    assert!(!mutation.is_loading());
    assert_eq!(
        store.get(&key("/letter")).value,
        Some(json!([{ "letterId": "l1" }, { "letterId": "l2" }]))
    );
    let reported = reported.lock().expect("report lock").clone();
    assert_eq!(reported.map(|error| error.error), Some(FetchError::Unauthorized));
}

#[tokio::test]
async fn post_sends_params_and_reports_success_after_cache_update() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::POST, "/recipient", Ok(json!({ "recipientId": "r9" })));
    let (store, mutations) = coordinator(&fetcher);
    store.set(&key("/recipient/r9"), |_| json!({ "recipientId": "r9" }));

    let observed = Arc::new(Mutex::new(None::<(Value, Option<Value>)>));
    let slot = Arc::clone(&observed);
    let callback_store = Arc::clone(&store);
    let mutation = mutations.use_mutation(
        MutationConfig::new(MutationMethod::Post)
            .key(key("/recipient/r9"))
            .on_update(replace_with_params())
            .token(Some("t1".to_string()))
            .on_success(move |data| {
                let cached = callback_store.get(&key("/recipient/r9")).value;
                *slot.lock().expect("observed lock") = Some((data.clone(), cached));
            }),
    );

    let body = params(json!({ "recipientId": "r9", "firstName": "Ada" }));
    let data = mutation
        .mutate(MutationDescriptor::new("/recipient", body.clone()))
        .await
        .expect("create");

    assert_eq!(data, json!({ "recipientId": "r9" }));
    assert_eq!(fetcher.calls()[0].body, Some(Value::Object(body.clone())));
    let (callback_data, cached) = observed
        .lock()
        .expect("observed lock")
        .clone()
        .expect("success callback ran");
    assert_eq!(callback_data, data);
    assert_eq!(cached, Some(Value::Object(body)));
}

#[tokio::test]
async fn binding_without_rule_is_left_for_revalidation() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/correspondence/c1", Ok(json!({})));
    fetcher.respond(Method::GET, "/correspondence/c1", envelope(json!(null)));
    let (store, mutations) = coordinator(&fetcher);
    store.set(&key("/correspondence/c1"), |_| json!({ "correspondenceId": "c1" }));
    let queries = QueryCoordinator::new(
        Arc::clone(&store),
        fetcher.clone(),
        CacheConfig::default(),
    );

    let mutation = mutations.use_mutation(
        MutationConfig::new(MutationMethod::Delete)
            .cache(vec![UpdateRuleBinding::untouched(key("/correspondence/c1"))])
            .token(Some("t1".to_string())),
    );
    mutation
        .mutate(MutationDescriptor::new(
            "/correspondence/c1",
            params(json!({ "correspondenceId": "c1" })),
        ))
        .await
        .expect("delete");

    assert_eq!(
        store.get(&key("/correspondence/c1")).value,
        Some(json!({ "correspondenceId": "c1" }))
    );

    let refreshed = queries
        .revalidate(&QueryDescriptor::new(
            key("/correspondence/c1"),
            Some("t1".to_string()),
        ))
        .await
        .expect("refetch");
    assert_eq!(refreshed, Value::Null);
}

#[tokio::test]
async fn listeners_see_all_bound_views_updated_together() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/letter/l1", Ok(json!({})));
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);

    let consistent = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&consistent);
    let reader = Arc::clone(&store);
    let _subscription = store.subscribe(&key("/letter"), move |_, _| {
        let detail = reader.get(&key("/correspondence/c1")).value;
        let embedded_gone = detail
            .and_then(|value| value["letters"].as_array().cloned())
            .is_some_and(|items| items.iter().all(|item| item["letterId"] != "l1"));
        flag.store(embedded_gone, Ordering::SeqCst);
    });

    let config = letters::delete(Some("c1")).expect("bindings");
    mutations
        .use_mutation(config.token(Some("t1".to_string())))
        .mutate(LETTERS.delete_descriptor("l1"))
        .await
        .expect("delete");

    assert!(consistent.load(Ordering::SeqCst));
}

#[tokio::test]
async fn optimistic_update_is_visible_in_flight_and_rolled_back_on_failure() {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gate(Method::DELETE, "/letter/l1");
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);
    let original = store.get(&key("/letter")).value;

    let config = letters::delete(Some("c1"))
        .expect("bindings")
        .token(Some("t1".to_string()))
        .optimistic(true);
    let mutation = Arc::new(mutations.use_mutation(config));

    let running = Arc::clone(&mutation);
    let task = tokio::spawn(async move { running.mutate(LETTERS.delete_descriptor("l1")).await });

    fetcher.wait_for_calls(1).await;
    assert!(mutation.is_loading());
    assert_eq!(
        store.get(&key("/letter")).value,
        Some(json!([{ "letterId": "l2" }]))
    );

    gate.send(Err(FetchError::network("connection reset")))
        .expect("mutation still waiting");
    let outcome = task.await.expect("mutation task");

    assert!(outcome.is_err());
    assert!(!mutation.is_loading());
    assert_eq!(store.get(&key("/letter")).value, original);
    let detail = store.get(&key("/correspondence/c1")).value.expect("detail");
    assert_eq!(detail["letters"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn optimistic_success_applies_rules_once() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(Method::DELETE, "/letter/l1", Ok(json!({})));
    let (store, mutations) = coordinator(&fetcher);
    seed_letter_views(&store);
    let before = store.get(&key("/letter")).revision;

    let applications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&applications);
    let rule = letterbox::application::UpdateRule::new(move |previous, params| {
        counter.fetch_add(1, Ordering::SeqCst);
        remove_where("letterId").apply(previous, params)
    });
    let mutation = mutations.use_mutation(
        MutationConfig::new(MutationMethod::Delete)
            .key(key("/letter"))
            .on_update(rule)
            .token(Some("t1".to_string()))
            .optimistic(true),
    );

    mutation.mutate(delete_letter("l1")).await.expect("delete");

    assert_eq!(applications.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(&key("/letter")).revision, before + 1);
    assert_eq!(
        store.get(&key("/letter")).value,
        Some(json!([{ "letterId": "l2" }]))
    );
}

#[tokio::test]
async fn is_loading_tracks_pending_write() {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gate(Method::PUT, "/letter/l1");
    let (_store, mutations) = coordinator(&fetcher);

    let config = letters::update("l1")
        .expect("bindings")
        .token(Some("t1".to_string()));
    let mutation = Arc::new(mutations.use_mutation(config));
    assert!(!mutation.is_loading());

    let running = Arc::clone(&mutation);
    let task = tokio::spawn(async move {
        running
            .mutate(LETTERS.update_descriptor("l1", params(json!({ "title": "B" }))))
            .await
    });

    fetcher.wait_for_calls(1).await;
    assert!(mutation.is_loading());

    gate.send(Ok(json!({}))).expect("mutation still waiting");
    task.await.expect("mutation task").expect("update");
    assert!(!mutation.is_loading());
}
