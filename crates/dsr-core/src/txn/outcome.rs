//! Result of a transactional unit.

use std::fmt;

use crate::fault::{AsFault, StoreFault};
use crate::store::DocId;

/// Where a transaction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortStage {
    /// Acquiring the session or starting the transaction.
    Begin,
    /// Executing the step at this index.
    Step(usize),
    /// Committing.
    Commit,
}

impl fmt::Display for AbortStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortStage::Begin => write!(f, "begin"),
            AbortStage::Step(i) => write!(f, "step {}", i),
            AbortStage::Commit => write!(f, "commit"),
        }
    }
}

/// A transaction was rolled back; none of its writes are visible.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction aborted at {stage}: {fault}")]
pub struct TransactionAborted {
    pub stage: AbortStage,
    pub fault: StoreFault,
}

impl AsFault for TransactionAborted {
    fn as_fault(&self) -> &StoreFault {
        &self.fault
    }
}

/// All-or-nothing result of one transactional unit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Committed; ids of every document inserted or upserted, in step order.
    Committed { ids: Vec<DocId> },
    Aborted(TransactionAborted),
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed { .. })
    }

    pub fn into_result(self) -> Result<Vec<DocId>, TransactionAborted> {
        match self {
            TransactionOutcome::Committed { ids } => Ok(ids),
            TransactionOutcome::Aborted(e) => Err(e),
        }
    }
}
