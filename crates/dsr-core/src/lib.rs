//! Retry and backoff orchestration for a replicated document store.
//!
//! Store faults are classified as transient or fatal, retried under a
//! per-operation-class policy with capped backoff, and multi-document writes
//! run as all-or-nothing transactional units.

pub mod config;
pub mod fault;
pub mod logging;
pub mod retry;
pub mod store;
pub mod txn;
pub mod workload;
