//! Fault type surfaced by store clients.

/// Type identifiers used by the bundled store backends.
///
/// The first four are the transient signatures recognised out of the box;
/// the rest are fatal unless a config opts them in.
pub mod kinds {
    /// Could not open a connection to the store.
    pub const SOCKET_OPEN: &str = "SocketOpen";
    /// Connection dropped while reading a reply.
    pub const SOCKET_READ: &str = "SocketRead";
    /// Write reached a member that is no longer primary.
    pub const NOT_PRIMARY: &str = "NotPrimary";
    /// Member is recovering (or otherwise temporarily unable to serve).
    pub const NODE_IS_RECOVERING: &str = "NodeIsRecovering";

    pub const POOL_TIMED_OUT: &str = "PoolTimedOut";
    pub const POOL_CLOSED: &str = "PoolClosed";
    pub const DUPLICATE_KEY: &str = "DuplicateKey";
    pub const INVALID_DOCUMENT: &str = "InvalidDocument";
    pub const TYPE_MISMATCH: &str = "TypeMismatch";
    pub const NO_TRANSACTION: &str = "NoTransactionInProgress";
    pub const TRANSACTION_IN_PROGRESS: &str = "TransactionInProgress";
    pub const WRITE_CONFLICT: &str = "WriteConflict";
    pub const CORRUPT_DOCUMENT: &str = "CorruptDocument";
    pub const DATABASE: &str = "DatabaseError";
    pub const INTERNAL: &str = "Internal";
}

/// A failure reported by the store: a type identifier plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StoreFault {
    kind: String,
    message: String,
}

impl StoreFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Type identifier (e.g. `NotPrimary`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that wrap (or are) a store fault, so the orchestrator can classify them.
pub trait AsFault {
    fn as_fault(&self) -> &StoreFault;
}

impl AsFault for StoreFault {
    fn as_fault(&self) -> &StoreFault {
        self
    }
}
