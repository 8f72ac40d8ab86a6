//! Store faults and their classification.
//!
//! Every failure surfaced by a store client is a [`StoreFault`] carrying a
//! type identifier (`kind`) and a message. The [`FaultClassifier`] maps a
//! fault to [`Verdict::Retryable`] only when it matches a known transient
//! signature (replica-set failover, socket faults); everything else is fatal.

mod classify;
mod error;

pub use classify::{FaultClassifier, SignatureSet, Verdict};
pub use error::{kinds, AsFault, StoreFault};
