//! Workload tests over the in-memory store (paused clock, millisecond policies).

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::fault::kinds;
use crate::retry::RetryPolicy;
use crate::store::memory::Op;
use crate::store::MemoryStore;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn fast_policies() -> Policies {
    Policies::new(
        RetryPolicy::new(2, ms(10), ms(10)).unwrap(),
        RetryPolicy::new(5, ms(10), ms(70)).unwrap().with_jitter(true),
        RetryPolicy::new(5, ms(10), ms(70)).unwrap(),
    )
}

fn workload_with(store: &MemoryStore, cancel: CancellationToken) -> Workload {
    Workload::new(
        Arc::new(store.clone()),
        Orchestrator::new(Arc::new(FaultClassifier::default())),
        fast_policies(),
        cancel,
    )
}

fn workload(store: &MemoryStore) -> Workload {
    workload_with(store, CancellationToken::new())
}

fn profile(id: &str, name: &str, age: i64) -> Document {
    json!({ "_id": id, "name": name, "address": "1 Quarry Road", "age": age })
        .as_object()
        .cloned()
        .unwrap()
}

fn count(store: &MemoryStore, op: Op) -> usize {
    store.journal().into_iter().filter(|o| *o == op).count()
}

#[tokio::test(start_paused = true)]
async fn create_inserts_generated_profiles() {
    let store = MemoryStore::new();
    let ids = workload(&store).create(DEFAULT_COUNT).await.unwrap();
    assert_eq!(ids.len(), DEFAULT_COUNT);

    let docs = store.documents(USER_PROFILE);
    assert_eq!(docs.len(), DEFAULT_COUNT);
    for d in &docs {
        let age = d["age"].as_i64().unwrap();
        assert!((10..90).contains(&age));
        assert!(d["name"].as_str().unwrap().contains(' '));
    }
}

#[tokio::test(start_paused = true)]
async fn create_retries_transient_bulk_insert() {
    let store = MemoryStore::new();
    store.inject_fault(Op::InsertMany, StoreFault::new(kinds::SOCKET_READ, "reset"));
    let ids = workload(&store).create(3).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(count(&store, Op::InsertMany), 2);
}

#[tokio::test(start_paused = true)]
async fn read_drains_matching_profiles() {
    let store = MemoryStore::new();
    let docs: Vec<_> = (0..12)
        .map(|i| profile(&format!("u{i}"), "Alma Hahn", if i % 2 == 0 { 25 } else { 40 }))
        .collect();
    let w = workload(&store);
    w.insert_profiles(docs).await.unwrap();

    let found = w.read(25).await.unwrap();
    assert_eq!(found.len(), 6);
    assert!(found.iter().all(|d| d["age"] == 25));
}

#[tokio::test(start_paused = true)]
async fn read_retries_once_then_gives_up() {
    let store = MemoryStore::new();
    store.inject_fault(Op::Find, StoreFault::new(kinds::NOT_PRIMARY, "stepped down"));
    assert!(workload(&store).read(25).await.unwrap().is_empty());

    store.inject_fault(Op::Find, StoreFault::new(kinds::NOT_PRIMARY, "stepped down"));
    store.inject_fault(Op::Find, StoreFault::new(kinds::NODE_IS_RECOVERING, "recovering"));
    let err = workload(&store).read(25).await.unwrap_err();
    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), 2);
    assert_eq!(err.fault().unwrap().kind(), kinds::NODE_IS_RECOVERING);
}

#[tokio::test(start_paused = true)]
async fn update_increments_age_once_and_clears_marker() {
    let store = MemoryStore::new();
    let w = workload(&store);
    w.insert_profiles(vec![profile("u1", "Otis Nolan", 30)]).await.unwrap();

    store.pass(Op::UpdateOne, 1);
    store.inject_fault(Op::UpdateOne, StoreFault::new(kinds::SOCKET_OPEN, "refused"));
    let r = w.update("u1").await.unwrap();
    assert_eq!((r.matched, r.modified), (1, 1));
    assert_eq!(count(&store, Op::UpdateOne), 3);

    let doc = &store.documents(USER_PROFILE)[0];
    assert_eq!(doc["age"], 31);
    assert_eq!(doc["pendingOperations"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn update_of_missing_user_upserts_it() {
    let store = MemoryStore::new();
    let r = workload(&store).update("ghost").await.unwrap();
    assert_eq!(r.matched, 1);
    let docs = store.documents(USER_PROFILE);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["_id"], "ghost");
    assert_eq!(docs[0]["age"], 1);
}

#[tokio::test(start_paused = true)]
async fn delete_removes_one_by_name() {
    let store = MemoryStore::new();
    let w = workload(&store);
    w.insert_profiles(vec![
        profile("a", DEFAULT_DELETE_NAME, 20),
        profile("b", DEFAULT_DELETE_NAME, 21),
        profile("c", "Noor Price", 22),
    ])
    .await
    .unwrap();

    assert_eq!(w.delete(DEFAULT_DELETE_NAME).await.unwrap(), 1);
    assert_eq!(store.documents(USER_PROFILE).len(), 2);
    assert_eq!(w.delete("Nobody").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn fatal_write_fault_is_not_retried() {
    let store = MemoryStore::new();
    store.inject_fault(Op::DeleteOne, StoreFault::new(kinds::INTERNAL, "boom"));
    let err = workload(&store).delete("x").await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.attempts(), 1);
    assert_eq!(count(&store, Op::DeleteOne), 1);
}

#[tokio::test(start_paused = true)]
async fn transaction_links_profile_and_personalization() {
    let store = MemoryStore::new();
    let ids = workload(&store).transaction().await.unwrap();
    assert_eq!(ids.len(), 2);

    let profiles = store.documents(USER_PROFILE);
    let records = store.documents(PERSONALIZATION);
    assert_eq!(profiles.len(), 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["user_id"], profiles[0]["_id"]);
    assert_eq!(records[0]["campaign"], json!(["CROSS_SELL", "UP_SELL"]));
    assert!(records[0]["notificationDate"].as_u64().unwrap() > 0);
}

#[tokio::test(start_paused = true)]
async fn transaction_retries_after_transient_commit_failure() {
    let store = MemoryStore::new();
    store.inject_fault(
        Op::CommitTransaction,
        StoreFault::new(kinds::NOT_PRIMARY, "primary stepped down"),
    );
    let ids = workload(&store).transaction().await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(count(&store, Op::StartSession), 2);
    assert_eq!(count(&store, Op::AbortTransaction), 1);
    assert_eq!(store.documents(USER_PROFILE).len(), 1);
    assert_eq!(store.documents(PERSONALIZATION).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_all_executes_demo_sequence() {
    let store = MemoryStore::new();
    let report = workload(&store).run_all().await.unwrap();
    assert_eq!(report.inserted.len(), DEFAULT_COUNT);
    assert_eq!(report.updated.as_ref().map(|u| u.modified), Some(1));
    assert_eq!(report.transaction.len(), 2);

    let profiles = store.documents(USER_PROFILE).len() as u64;
    assert_eq!(profiles, DEFAULT_COUNT as u64 + 1 - report.deleted);
}

#[tokio::test(start_paused = true)]
async fn cancelled_token_stops_before_first_attempt() {
    let store = MemoryStore::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = workload_with(&store, cancel).create(2).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 0);
    assert!(store.journal().is_empty());
}

#[test]
fn from_config_applies_classifier_extensions() {
    let mut cfg = DsrConfig::default();
    cfg.classifier.extra_kinds.push(kinds::POOL_TIMED_OUT.to_string());
    let store = MemoryStore::new();
    let w = Workload::from_config(Arc::new(store), &cfg, CancellationToken::new()).unwrap();
    assert_eq!(w.policies().write().policy().max_attempts(), 5);
    assert!(w
        .orchestrator
        .classifier()
        .classify(&StoreFault::new(kinds::POOL_TIMED_OUT, "pool timed out"))
        .is_retryable());
}

#[test]
fn from_config_rejects_invalid_policy() {
    let mut cfg = DsrConfig::default();
    cfg.retry.read.max_attempts = 0;
    let err = Workload::from_config(Arc::new(MemoryStore::new()), &cfg, CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(err, PolicyError::NoAttempts);
}
