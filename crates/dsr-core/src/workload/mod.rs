//! Demo CRUD workload driven through the retry orchestrator.
//!
//! Each operation runs under the policy of its class: finds under the read
//! policy, single-collection writes under the write policy, and the
//! two-collection insert as a transactional unit under the transaction policy.

pub mod mock;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DsrConfig;
use crate::fault::{FaultClassifier, SignatureSet, StoreFault};
use crate::retry::{Orchestrator, Policies, PolicyError, RetryError};
use crate::store::{new_id, DocId, Document, Filter, StoreClient, Update, UpdateResult};
use crate::txn::{TransactionAborted, TransactionalUnit, TxStep};

pub const USER_PROFILE: &str = "userProfile";
pub const PERSONALIZATION: &str = "personalization";

/// Documents per bulk insert.
pub const DEFAULT_COUNT: usize = 10;
/// Age matched by the demo read.
pub const DEFAULT_AGE: i64 = 25;
/// Name removed by the demo delete.
pub const DEFAULT_DELETE_NAME: &str = "Shaun Feest";
const READ_BATCH_SIZE: usize = 5;

/// What `run_all` did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadReport {
    pub inserted: Vec<DocId>,
    pub read: usize,
    pub updated: Option<UpdateResult>,
    pub deleted: u64,
    /// `[user profile id, personalization id]` from the committed transaction.
    pub transaction: Vec<DocId>,
}

/// CRUD demo sequence over one store client.
#[derive(Clone)]
pub struct Workload {
    client: Arc<dyn StoreClient>,
    orchestrator: Orchestrator,
    policies: Policies,
    cancel: CancellationToken,
}

impl Workload {
    pub fn new(
        client: Arc<dyn StoreClient>,
        orchestrator: Orchestrator,
        policies: Policies,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            orchestrator,
            policies,
            cancel,
        }
    }

    /// Build classifier and policies from config.
    pub fn from_config(
        client: Arc<dyn StoreClient>,
        cfg: &DsrConfig,
        cancel: CancellationToken,
    ) -> Result<Self, PolicyError> {
        let classifier = FaultClassifier::new(SignatureSet::from_config(&cfg.classifier));
        let policies = Policies::from_config(&cfg.retry)?;
        Ok(Self::new(
            client,
            Orchestrator::new(Arc::new(classifier)),
            policies,
            cancel,
        ))
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    /// Bulk ordered insert of `count` generated user profiles.
    pub async fn create(&self, count: usize) -> Result<Vec<DocId>, RetryError<StoreFault>> {
        let docs = mock::user_profiles(&mut rand::thread_rng(), count);
        self.insert_profiles(docs).await
    }

    /// Ordered insert of caller-supplied profiles under the write policy.
    ///
    /// Ids are fixed before the first attempt, so a retry after a partial
    /// success reports `DuplicateKey` for the already-stored prefix.
    pub async fn insert_profiles(
        &self,
        docs: Vec<Document>,
    ) -> Result<Vec<DocId>, RetryError<StoreFault>> {
        let client = &self.client;
        let ids = self
            .orchestrator
            .execute(&self.policies.write(), &self.cancel, || {
                let docs = docs.clone();
                async move { client.insert_many(USER_PROFILE, docs, true).await }
            })
            .await?;
        tracing::info!(count = ids.len(), "inserted user profiles");
        Ok(ids)
    }

    /// Profiles with the given age, drained in batches of five.
    pub async fn read(&self, age: i64) -> Result<Vec<Document>, RetryError<StoreFault>> {
        let client = &self.client;
        let filter = Filter::eq("age", age);
        let filter = &filter;
        let mut cursor = self
            .orchestrator
            .execute(&self.policies.read(), &self.cancel, || async move {
                client.find(USER_PROFILE, filter).await
            })
            .await?
            .batch_size(READ_BATCH_SIZE);

        let mut out = Vec::new();
        loop {
            let batch = cursor.next_batch();
            if batch.is_empty() {
                break;
            }
            tracing::debug!(size = batch.len(), "read batch");
            out.extend(batch);
        }
        tracing::info!(age, count = out.len(), "read user profiles");
        Ok(out)
    }

    /// Increment the user's age exactly once, even across retries.
    ///
    /// Step one records a fresh operation id in `pendingOperations` (upsert).
    /// Step two matches on that id, increments `age` and pulls the id, so a
    /// replayed step two matches nothing.
    pub async fn update(&self, user_id: &str) -> Result<UpdateResult, RetryError<StoreFault>> {
        let op_id = new_id();
        let client = &self.client;
        let class = self.policies.write();

        let mark_filter = Filter::by_id(user_id);
        let mark = Update::new().add_to_set("pendingOperations", op_id.as_str());
        let (mark_filter, mark) = (&mark_filter, &mark);
        self.orchestrator
            .execute(&class, &self.cancel, || async move {
                client.update_one(USER_PROFILE, mark_filter, mark, true).await
            })
            .await?;

        let apply_filter = Filter::by_id(user_id).and("pendingOperations", op_id.as_str());
        let apply = Update::new()
            .inc("age", 1)
            .pull("pendingOperations", op_id.as_str());
        let (apply_filter, apply) = (&apply_filter, &apply);
        let result = self
            .orchestrator
            .execute(&class, &self.cancel, || async move {
                client.update_one(USER_PROFILE, apply_filter, apply, false).await
            })
            .await?;
        tracing::info!(user_id, op_id = %op_id, modified = result.modified, "updated user profile");
        Ok(result)
    }

    /// Delete one profile by name. Returns the number removed (0 or 1).
    pub async fn delete(&self, name: &str) -> Result<u64, RetryError<StoreFault>> {
        let client = &self.client;
        let filter = Filter::eq("name", name);
        let filter = &filter;
        let n = self
            .orchestrator
            .execute(&self.policies.write(), &self.cancel, || async move {
                client.delete_one(USER_PROFILE, filter).await
            })
            .await?;
        tracing::info!(name, deleted = n, "deleted user profile");
        Ok(n)
    }

    /// Insert a profile and its personalization record atomically.
    pub async fn transaction(&self) -> Result<Vec<DocId>, RetryError<TransactionAborted>> {
        let profile = mock::user_profile(&mut rand::thread_rng());
        let user_id = crate::store::doc_id(&profile).unwrap_or_else(new_id);
        self.transaction_with(profile, mock::personalization(&user_id))
            .await
    }

    /// Transactional insert of a given profile and personalization pair.
    pub async fn transaction_with(
        &self,
        profile: Document,
        personalization: Document,
    ) -> Result<Vec<DocId>, RetryError<TransactionAborted>> {
        let steps = [
            TxStep::insert(USER_PROFILE, profile),
            TxStep::insert(PERSONALIZATION, personalization),
        ];
        let unit = TransactionalUnit::new(Arc::clone(&self.client));
        let ids = self
            .orchestrator
            .run_transaction(&unit, &self.policies.transaction(), &steps, &self.cancel)
            .await?;
        tracing::info!(ids = ?ids, "transaction committed");
        Ok(ids)
    }

    /// create, read, update, delete, transaction; stops at the first failure.
    pub async fn run_all(&self) -> anyhow::Result<WorkloadReport> {
        let mut report = WorkloadReport {
            inserted: self.create(DEFAULT_COUNT).await?,
            ..WorkloadReport::default()
        };
        report.read = self.read(DEFAULT_AGE).await?.len();
        if let Some(first) = report.inserted.first() {
            report.updated = Some(self.update(first).await?);
        }
        report.deleted = self.delete(DEFAULT_DELETE_NAME).await?;
        report.transaction = self.transaction().await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests;
