//! Session backed by a pooled SQLite transaction.

use async_trait::async_trait;
use sqlx::{Pool, Sqlite, Transaction};

use crate::fault::{kinds, StoreFault};
use crate::store::document::{DocId, Document, Filter, Update};
use crate::store::options::{TransactionOptions, UpdateResult};
use crate::store::Session;

use super::fault::fault_from_sqlx;
use super::ops;

pub(super) struct SqliteSession {
    pool: Pool<Sqlite>,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteSession {
    pub(super) fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool, tx: None }
    }

    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreFault> {
        self.tx.as_mut().ok_or_else(no_transaction)
    }

    fn take_tx(&mut self) -> Result<Transaction<'static, Sqlite>, StoreFault> {
        self.tx.take().ok_or_else(no_transaction)
    }
}

fn no_transaction() -> StoreFault {
    StoreFault::new(kinds::NO_TRANSACTION, "no transaction in progress")
}

#[async_trait]
impl Session for SqliteSession {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> Result<(), StoreFault> {
        if self.tx.is_some() {
            return Err(StoreFault::new(
                kinds::TRANSACTION_IN_PROGRESS,
                "transaction already in progress",
            ));
        }
        // A single SQLite file has one writer and no secondaries, so every
        // read is primary and every commit is durable on the only member.
        tracing::debug!(?options, "begin sqlite transaction");
        let tx = self.pool.begin().await.map_err(fault_from_sqlx)?;
        self.tx = Some(tx);
        Ok(())
    }

    async fn insert_one(&mut self, collection: &str, doc: Document) -> Result<DocId, StoreFault> {
        let tx = self.tx()?;
        ops::insert(tx, collection, doc).await
    }

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreFault> {
        let tx = self.tx()?;
        ops::update(tx, collection, filter, update, upsert).await
    }

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreFault> {
        let tx = self.tx()?;
        ops::delete(tx, collection, filter).await
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreFault> {
        self.take_tx()?.commit().await.map_err(fault_from_sqlx)
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreFault> {
        self.take_tx()?.rollback().await.map_err(fault_from_sqlx)
    }

    async fn close(mut self: Box<Self>) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!("rollback on session close failed: {}", e);
            }
        }
    }
}
