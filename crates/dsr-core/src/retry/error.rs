//! Errors surfaced by the retry orchestrator.

use std::time::Duration;

/// Why an orchestrated operation did not produce a result.
///
/// Every variant carries the attempt count and the total backoff that was
/// scheduled, so callers can log and diagnose without extra bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The fault was not retryable; surfaced as-is, no further attempts.
    #[error("{class} failed with fatal fault on attempt {attempts}: {fault}")]
    Fatal {
        class: &'static str,
        fault: E,
        attempts: u32,
        backoff: Duration,
    },
    /// Every attempt failed transiently; carries the last fault observed.
    #[error("{class} retries exhausted after {attempts} attempts ({backoff:?} backoff): {last}")]
    Exhausted {
        class: &'static str,
        last: E,
        attempts: u32,
        backoff: Duration,
    },
    /// The caller cancelled the sequence before it resolved.
    #[error("{class} cancelled after {attempts} attempt(s)")]
    Cancelled {
        class: &'static str,
        last: Option<E>,
        attempts: u32,
        backoff: Duration,
    },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Total backoff scheduled across the sequence.
    pub fn backoff(&self) -> Duration {
        match self {
            RetryError::Fatal { backoff, .. }
            | RetryError::Exhausted { backoff, .. }
            | RetryError::Cancelled { backoff, .. } => *backoff,
        }
    }

    /// The fault that ended the sequence (the last one seen, if any).
    pub fn fault(&self) -> Option<&E> {
        match self {
            RetryError::Fatal { fault, .. } => Some(fault),
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled { last, .. } => last.as_ref(),
        }
    }

    pub fn into_fault(self) -> Option<E> {
        match self {
            RetryError::Fatal { fault, .. } => Some(fault),
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled { last, .. } => last,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RetryError::Fatal { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}
