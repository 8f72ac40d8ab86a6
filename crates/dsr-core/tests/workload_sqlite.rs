//! Workload against a SQLite file store, including pool exhaustion.

use std::sync::Arc;
use std::time::Duration;

use dsr_core::config::{DsrConfig, RetryConfig, StoreBackend, StoreConfig};
use dsr_core::fault::kinds;
use dsr_core::store::{self, Filter, SqliteStore, StoreClient, TransactionOptions};
use dsr_core::workload::{Workload, PERSONALIZATION, USER_PROFILE};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn quick_retries(cfg: &mut DsrConfig) {
    cfg.retry.read = RetryConfig {
        base_delay_ms: 200,
        max_delay_ms: 200,
        ..RetryConfig::read_default()
    };
    cfg.retry.write = RetryConfig {
        base_delay_ms: 10,
        max_delay_ms: 40,
        ..RetryConfig::write_default()
    };
    cfg.retry.transaction = cfg.retry.write.clone();
}

#[tokio::test]
async fn demo_runs_against_sqlite_file() {
    let dir = tempdir().unwrap();
    let mut cfg = DsrConfig::default();
    cfg.store = StoreConfig {
        backend: StoreBackend::Sqlite,
        path: Some(dir.path().join("nested").join("store.db")),
        ..StoreConfig::default()
    };
    quick_retries(&mut cfg);

    let client = store::open(&cfg.store).await.unwrap();
    let w = Workload::from_config(Arc::clone(&client), &cfg, CancellationToken::new()).unwrap();
    let report = w.run_all().await.unwrap();
    assert_eq!(report.inserted.len(), 10);
    assert_eq!(report.updated.map(|u| u.modified), Some(1));

    let profiles = client.find(USER_PROFILE, &Filter::all()).await.unwrap().count() as u64;
    assert_eq!(profiles, 11 - report.deleted);
    let records: Vec<_> = client
        .find(PERSONALIZATION, &Filter::all())
        .await
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["user_id"], report.transaction[0].as_str());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig {
        path: Some(dir.path().join("store.db")),
        ..StoreConfig::default()
    };
    let ids = {
        let store = SqliteStore::open(&cfg).await.unwrap();
        let w = Workload::from_config(Arc::new(store.clone()), &DsrConfig::default(), CancellationToken::new())
            .unwrap();
        let ids = w.create(3).await.unwrap();
        store.close().await;
        ids
    };
    let store = SqliteStore::open(&cfg).await.unwrap();
    for id in ids {
        assert_eq!(store.find(USER_PROFILE, &Filter::by_id(id)).await.unwrap().count(), 1);
    }
}

async fn held_pool(dir: &std::path::Path) -> (DsrConfig, Arc<dyn StoreClient>, Box<dyn store::Session>) {
    let mut cfg = DsrConfig::default();
    cfg.store = StoreConfig {
        path: Some(dir.join("store.db")),
        max_connections: 1,
        acquire_timeout_ms: 50,
        ..StoreConfig::default()
    };
    quick_retries(&mut cfg);
    let client = store::open(&cfg.store).await.unwrap();
    let mut session = client.start_session().await.unwrap();
    session
        .start_transaction(&TransactionOptions::default())
        .await
        .unwrap();
    (cfg, client, session)
}

#[tokio::test]
async fn pool_timeout_is_fatal_by_default() {
    let dir = tempdir().unwrap();
    let (cfg, client, session) = held_pool(dir.path()).await;
    let w = Workload::from_config(client, &cfg, CancellationToken::new()).unwrap();

    let err = w.read(25).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.attempts(), 1);
    assert_eq!(err.fault().unwrap().kind(), kinds::POOL_TIMED_OUT);
    session.close().await;
}

#[tokio::test]
async fn pool_timeout_retries_when_configured() {
    let dir = tempdir().unwrap();
    let (mut cfg, client, session) = held_pool(dir.path()).await;
    cfg.classifier
        .extra_kinds
        .push(kinds::POOL_TIMED_OUT.to_string());
    let w = Workload::from_config(client, &cfg, CancellationToken::new()).unwrap();

    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.close().await;
    });
    let found = w.read(25).await.unwrap();
    assert!(found.is_empty());
    release.await.unwrap();
}
