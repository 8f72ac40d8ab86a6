//! Scripted fault injection for the in-memory store.

use std::collections::{HashMap, VecDeque};

use crate::fault::StoreFault;

/// Store primitive, as recorded in the journal and targeted by fault scripts.
///
/// Session writes are recorded under the same op as their client counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Find,
    InsertOne,
    InsertMany,
    UpdateOne,
    DeleteOne,
    StartSession,
    StartTransaction,
    CommitTransaction,
    AbortTransaction,
    CloseSession,
}

/// Per-op queue of scripted outcomes. `None` lets the call through, `Some`
/// fails it. An empty queue lets every call through.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    scripts: HashMap<Op, VecDeque<Option<StoreFault>>>,
}

impl FaultPlan {
    pub(crate) fn push(&mut self, op: Op, outcome: Option<StoreFault>) {
        self.scripts.entry(op).or_default().push_back(outcome);
    }

    pub(crate) fn next(&mut self, op: Op) -> Result<(), StoreFault> {
        match self.scripts.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(Some(fault)) => Err(fault),
            _ => Ok(()),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.scripts.clear();
    }
}
