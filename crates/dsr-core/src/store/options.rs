//! Transaction consistency options and write results.

use super::document::DocId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreference {
    #[default]
    Primary,
    PrimaryPreferred,
    SecondaryPreferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteConcern {
    /// Acknowledged once a majority of replica-set members applied the write.
    #[default]
    Majority,
    /// Acknowledged by the primary alone.
    Acknowledged,
}

/// Consistency configuration for a transaction. Defaults to primary reads and
/// majority writes, so an acknowledged commit survives a failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub read_preference: ReadPreference,
    pub write_concern: WriteConcern,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<DocId>,
}
