//! Store client abstraction and bundled backends.
//!
//! The orchestrator treats the store as an opaque service: CRUD, bulk
//! inserts, cursors and session-scoped transactions, each failing with a
//! classifiable [`StoreFault`]. Two backends implement it: a process-local
//! [`MemoryStore`] with fault injection, and a SQLite-backed [`SqliteStore`].

mod cursor;
mod document;
pub mod memory;
mod options;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::fault::StoreFault;

pub use cursor::Cursor;
pub use document::{doc_id, ensure_id, new_id, DocId, Document, Filter, Update};
pub use memory::MemoryStore;
pub use options::{ReadPreference, TransactionOptions, UpdateResult, WriteConcern};
pub use sqlite::SqliteStore;

/// CRUD surface of a document store. Every call may fail with a [`StoreFault`].
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Documents in `collection` matching `filter`, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Cursor, StoreFault>;

    /// Insert one document; assigns an `_id` if missing.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<DocId, StoreFault>;

    /// Insert many documents. `ordered` stops at the first failure; otherwise
    /// every document is attempted and the first failure is reported.
    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
        ordered: bool,
    ) -> Result<Vec<DocId>, StoreFault>;

    /// Update the first document matching `filter`, inserting one if `upsert`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreFault>;

    /// Delete the first document matching `filter`; returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreFault>;

    async fn start_session(&self) -> Result<Box<dyn Session>, StoreFault>;
}

/// A client session. Writes are only accepted inside a transaction.
#[async_trait]
pub trait Session: Send {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> Result<(), StoreFault>;

    async fn insert_one(&mut self, collection: &str, doc: Document) -> Result<DocId, StoreFault>;

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreFault>;

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreFault>;

    async fn commit_transaction(&mut self) -> Result<(), StoreFault>;

    async fn abort_transaction(&mut self) -> Result<(), StoreFault>;

    /// Release the session. An open transaction is rolled back.
    async fn close(self: Box<Self>);
}

/// Open the backend selected in config.
pub async fn open(cfg: &StoreConfig) -> Result<Arc<dyn StoreClient>> {
    match cfg.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(cfg).await?;
            Ok(Arc::new(store))
        }
    }
}
