//! Mutation steps executed inside a transaction.

use crate::store::{Document, Filter, Update};

/// One mutation against one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum TxStep {
    Insert {
        collection: String,
        document: Document,
    },
    Update {
        collection: String,
        filter: Filter,
        update: Update,
        upsert: bool,
    },
    Delete {
        collection: String,
        filter: Filter,
    },
}

impl TxStep {
    pub fn insert(collection: impl Into<String>, document: Document) -> Self {
        TxStep::Insert {
            collection: collection.into(),
            document,
        }
    }

    pub fn update(collection: impl Into<String>, filter: Filter, update: Update, upsert: bool) -> Self {
        TxStep::Update {
            collection: collection.into(),
            filter,
            update,
            upsert,
        }
    }

    pub fn delete(collection: impl Into<String>, filter: Filter) -> Self {
        TxStep::Delete {
            collection: collection.into(),
            filter,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            TxStep::Insert { collection, .. }
            | TxStep::Update { collection, .. }
            | TxStep::Delete { collection, .. } => collection,
        }
    }
}
