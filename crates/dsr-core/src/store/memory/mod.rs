//! Process-local document store with transactional sessions, scripted faults
//! and a call journal.
//!
//! Transactions write to a private copy of the data. Commit checks that no
//! document the transaction touched has changed underneath it, then publishes
//! those documents under one lock; any change is a write conflict and nothing
//! is published. An abort simply drops the private copy.

mod plan;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::fault::{kinds, StoreFault};

use super::cursor::Cursor;
use super::document::{doc_id, ensure_id, DocId, Document, Filter, Update};
use super::options::{TransactionOptions, UpdateResult};
use super::{Session, StoreClient};

pub use plan::Op;
use plan::FaultPlan;

type Collections = BTreeMap<String, Vec<Document>>;

#[derive(Default)]
struct Inner {
    data: Mutex<Collections>,
    plan: Mutex<FaultPlan>,
    journal: Mutex<Vec<Op>>,
    last_options: Mutex<Option<TransactionOptions>>,
}

/// In-memory store. Cheap to clone; clones share data, faults and journal.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next not-yet-scripted call of `op` with `fault`.
    pub fn inject_fault(&self, op: Op, fault: StoreFault) {
        lock(&self.inner.plan).push(op, Some(fault));
    }

    /// Let the next `n` scripted calls of `op` through before any later injected fault.
    pub fn pass(&self, op: Op, n: usize) {
        let mut plan = lock(&self.inner.plan);
        for _ in 0..n {
            plan.push(op, None);
        }
    }

    pub fn clear_faults(&self) {
        lock(&self.inner.plan).clear();
    }

    /// Every primitive called so far, in order (including failed calls).
    pub fn journal(&self) -> Vec<Op> {
        lock(&self.inner.journal).clone()
    }

    /// Options passed to the most recent `start_transaction`.
    pub fn last_transaction_options(&self) -> Option<TransactionOptions> {
        *lock(&self.inner.last_options)
    }

    /// Committed contents of a collection.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.inner.data)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, op: Op) {
        lock(&self.inner.journal).push(op);
    }

    /// Journal the call, then consult the fault script.
    fn enter(&self, op: Op) -> Result<(), StoreFault> {
        self.record(op);
        lock(&self.inner.plan).next(op)
    }
}

fn duplicate(collection: &str, id: &str) -> StoreFault {
    StoreFault::new(
        kinds::DUPLICATE_KEY,
        format!("duplicate key in {collection}: _id {id}"),
    )
}

fn no_transaction() -> StoreFault {
    StoreFault::new(kinds::NO_TRANSACTION, "no transaction in progress")
}

fn insert(colls: &mut Collections, collection: &str, mut doc: Document) -> Result<DocId, StoreFault> {
    let id = ensure_id(&mut doc)?;
    let docs = colls.entry(collection.to_string()).or_default();
    if docs.iter().any(|d| doc_id(d).as_deref() == Some(id.as_str())) {
        return Err(duplicate(collection, &id));
    }
    docs.push(doc);
    Ok(id)
}

fn update(
    colls: &mut Collections,
    collection: &str,
    filter: &Filter,
    update: &Update,
    upsert: bool,
) -> Result<UpdateResult, StoreFault> {
    if let Some(existing) = colls
        .get_mut(collection)
        .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
    {
        let mut next = existing.clone();
        let modified = update.apply(&mut next)?;
        *existing = next;
        return Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
            upserted_id: None,
        });
    }
    if !upsert {
        return Ok(UpdateResult::default());
    }
    let mut seed = filter.seed();
    update.apply(&mut seed)?;
    let id = insert(colls, collection, seed)?;
    Ok(UpdateResult {
        matched: 0,
        modified: 0,
        upserted_id: Some(id),
    })
}

fn delete(colls: &mut Collections, collection: &str, filter: &Filter) -> u64 {
    let Some(docs) = colls.get_mut(collection) else {
        return 0;
    };
    match docs.iter().position(|d| filter.matches(d)) {
        Some(pos) => {
            docs.remove(pos);
            1
        }
        None => 0,
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Cursor, StoreFault> {
        self.enter(Op::Find)?;
        let docs = lock(&self.inner.data)
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();
        Ok(Cursor::new(docs))
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<DocId, StoreFault> {
        self.enter(Op::InsertOne)?;
        insert(&mut lock(&self.inner.data), collection, doc)
    }

    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
        ordered: bool,
    ) -> Result<Vec<DocId>, StoreFault> {
        self.enter(Op::InsertMany)?;
        let mut data = lock(&self.inner.data);
        let mut ids = Vec::with_capacity(docs.len());
        let mut first_err = None;
        for doc in docs {
            match insert(&mut data, collection, doc) {
                Ok(id) => ids.push(id),
                Err(fault) if ordered => return Err(fault),
                Err(fault) => {
                    first_err.get_or_insert(fault);
                }
            }
        }
        match first_err {
            Some(fault) => Err(fault),
            None => Ok(ids),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        u: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreFault> {
        self.enter(Op::UpdateOne)?;
        update(&mut lock(&self.inner.data), collection, filter, u, upsert)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreFault> {
        self.enter(Op::DeleteOne)?;
        Ok(delete(&mut lock(&self.inner.data), collection, filter))
    }

    async fn start_session(&self) -> Result<Box<dyn Session>, StoreFault> {
        self.enter(Op::StartSession)?;
        Ok(Box::new(MemorySession {
            store: self.clone(),
            txn: None,
        }))
    }
}

fn find_doc<'a>(colls: &'a Collections, collection: &str, id: &str) -> Option<&'a Document> {
    colls
        .get(collection)?
        .iter()
        .find(|d| doc_id(d).as_deref() == Some(id))
}

fn first_match_id(colls: &Collections, collection: &str, filter: &Filter) -> Option<DocId> {
    colls
        .get(collection)?
        .iter()
        .find(|d| filter.matches(d))
        .and_then(doc_id)
}

/// Private copy of the data an open transaction writes to.
struct Staged {
    /// Live data as of `start_transaction`.
    base: Collections,
    view: Collections,
    /// Documents written by the transaction, in first-write order.
    touched: Vec<(String, DocId)>,
}

impl Staged {
    fn touch(&mut self, collection: &str, id: DocId) {
        if !self
            .touched
            .iter()
            .any(|(c, i)| c == collection && *i == id)
        {
            self.touched.push((collection.to_string(), id));
        }
    }

    /// First touched document whose live version differs from the snapshot.
    fn conflict(&self, live: &Collections) -> Option<&(String, DocId)> {
        self.touched
            .iter()
            .find(|(c, id)| find_doc(live, c, id) != find_doc(&self.base, c, id))
    }

    /// Copy every touched document's staged state (or absence) into `live`.
    fn publish(&self, live: &mut Collections) {
        for (collection, id) in &self.touched {
            let staged = find_doc(&self.view, collection, id).cloned();
            let docs = live.entry(collection.clone()).or_default();
            let pos = docs
                .iter()
                .position(|d| doc_id(d).as_deref() == Some(id.as_str()));
            match (pos, staged) {
                (Some(i), Some(doc)) => docs[i] = doc,
                (Some(i), None) => {
                    docs.remove(i);
                }
                (None, Some(doc)) => docs.push(doc),
                (None, None) => {}
            }
        }
    }
}

struct MemorySession {
    store: MemoryStore,
    txn: Option<Staged>,
}

impl MemorySession {
    fn staged(&mut self) -> Result<&mut Staged, StoreFault> {
        self.txn
            .as_mut()
            .ok_or_else(no_transaction)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn start_transaction(&mut self, options: &TransactionOptions) -> Result<(), StoreFault> {
        self.store.enter(Op::StartTransaction)?;
        if self.txn.is_some() {
            return Err(StoreFault::new(
                kinds::TRANSACTION_IN_PROGRESS,
                "transaction already in progress",
            ));
        }
        *lock(&self.store.inner.last_options) = Some(*options);
        let base = lock(&self.store.inner.data).clone();
        self.txn = Some(Staged {
            view: base.clone(),
            base,
            touched: Vec::new(),
        });
        Ok(())
    }

    async fn insert_one(&mut self, collection: &str, doc: Document) -> Result<DocId, StoreFault> {
        self.store.enter(Op::InsertOne)?;
        let staged = self.staged()?;
        let id = insert(&mut staged.view, collection, doc)?;
        staged.touch(collection, id.clone());
        Ok(id)
    }

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        u: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreFault> {
        self.store.enter(Op::UpdateOne)?;
        let staged = self.staged()?;
        let target = first_match_id(&staged.view, collection, filter);
        let result = update(&mut staged.view, collection, filter, u, upsert)?;
        if let Some(id) = target.or_else(|| result.upserted_id.clone()) {
            staged.touch(collection, id);
        }
        Ok(result)
    }

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<u64, StoreFault> {
        self.store.enter(Op::DeleteOne)?;
        let staged = self.staged()?;
        if let Some(id) = first_match_id(&staged.view, collection, filter) {
            staged.touch(collection, id);
        }
        Ok(delete(&mut staged.view, collection, filter))
    }

    async fn commit_transaction(&mut self) -> Result<(), StoreFault> {
        self.store.enter(Op::CommitTransaction)?;
        let staged = self
            .txn
            .as_ref()
            .ok_or_else(no_transaction)?;
        let mut data = lock(&self.store.inner.data);
        if let Some((collection, id)) = staged.conflict(&data) {
            return Err(StoreFault::new(
                kinds::WRITE_CONFLICT,
                format!("commit conflict: {collection} _id {id} changed since the transaction started"),
            ));
        }
        staged.publish(&mut data);
        drop(data);
        self.txn = None;
        Ok(())
    }

    async fn abort_transaction(&mut self) -> Result<(), StoreFault> {
        self.store.enter(Op::AbortTransaction)?;
        self.staged()?;
        self.txn = None;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.store.record(Op::CloseSession);
    }
}
