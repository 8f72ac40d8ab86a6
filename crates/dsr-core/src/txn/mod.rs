//! Transactional unit: run ordered mutations as one atomic transaction.
//!
//! A session is acquired per run and always closed, the transaction is
//! started with primary reads and majority writes, and any failure before
//! commit triggers an explicit abort. Retrying is the orchestrator's job;
//! callers must pre-generate document ids so a retried run is idempotent.

mod outcome;
mod step;

use std::sync::Arc;

use crate::fault::StoreFault;
use crate::store::{DocId, Session, StoreClient, TransactionOptions};

pub use outcome::{AbortStage, TransactionAborted, TransactionOutcome};
pub use step::TxStep;

/// Executes a sequence of [`TxStep`]s inside one session-scoped transaction.
#[derive(Clone)]
pub struct TransactionalUnit {
    client: Arc<dyn StoreClient>,
    options: TransactionOptions,
}

impl TransactionalUnit {
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self::with_options(client, TransactionOptions::default())
    }

    pub fn with_options(client: Arc<dyn StoreClient>, options: TransactionOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// Run `steps` in order; commit if all succeed, abort otherwise.
    pub async fn run(&self, steps: &[TxStep]) -> TransactionOutcome {
        let mut session = match self.client.start_session().await {
            Ok(s) => s,
            Err(fault) => return aborted(AbortStage::Begin, fault),
        };
        let outcome = run_in_session(session.as_mut(), &self.options, steps).await;
        session.close().await;
        outcome
    }
}

async fn run_in_session(
    session: &mut dyn Session,
    options: &TransactionOptions,
    steps: &[TxStep],
) -> TransactionOutcome {
    if let Err(fault) = session.start_transaction(options).await {
        return aborted(AbortStage::Begin, fault);
    }

    let mut ids = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        match apply(session, step).await {
            Ok(Some(id)) => ids.push(id),
            Ok(None) => {}
            Err(fault) => {
                abort(session).await;
                return aborted(AbortStage::Step(i), fault);
            }
        }
    }

    if let Err(fault) = session.commit_transaction().await {
        abort(session).await;
        return aborted(AbortStage::Commit, fault);
    }
    tracing::debug!(steps = steps.len(), written = ids.len(), "transaction committed");
    TransactionOutcome::Committed { ids }
}

async fn apply(session: &mut dyn Session, step: &TxStep) -> Result<Option<DocId>, StoreFault> {
    match step {
        TxStep::Insert {
            collection,
            document,
        } => session.insert_one(collection, document.clone()).await.map(Some),
        TxStep::Update {
            collection,
            filter,
            update,
            upsert,
        } => Ok(session
            .update_one(collection, filter, update, *upsert)
            .await?
            .upserted_id),
        TxStep::Delete { collection, filter } => {
            session.delete_one(collection, filter).await?;
            Ok(None)
        }
    }
}

/// Abort is best-effort: the triggering fault is what the caller needs to see.
async fn abort(session: &mut dyn Session) {
    if let Err(fault) = session.abort_transaction().await {
        tracing::warn!(kind = fault.kind(), "abort failed: {}", fault.message());
    }
}

fn aborted(stage: AbortStage, fault: StoreFault) -> TransactionOutcome {
    tracing::warn!(%stage, kind = fault.kind(), "transaction aborted: {}", fault.message());
    TransactionOutcome::Aborted(TransactionAborted { stage, fault })
}
