//! Retry and backoff orchestration.
//!
//! This module encapsulates retry policies (attempt caps, exponential or
//! Fibonacci backoff with a cap and optional jitter) and the orchestrator that
//! drives an operation through them, consulting the fault classifier after
//! each failure. Reads, writes and transactions each get their own policy.

mod attempt;
mod error;
mod policy;
mod run;

pub use error::RetryError;
pub use policy::{BackoffLaw, OperationClass, Policies, PolicyError, RetryDecision, RetryPolicy};
pub use run::Orchestrator;
