//! Per-call attempt bookkeeping shared by the async and blocking drivers.

use std::time::Duration;

use crate::fault::{StoreFault, Verdict};

use super::error::RetryError;
use super::policy::{OperationClass, RetryDecision};

/// One execution try. Lives only for the duration of a single orchestrated call.
#[derive(Debug, Clone)]
pub(crate) struct Attempt {
    pub(crate) index: u32,
    pub(crate) error: Option<StoreFault>,
    pub(crate) delay_before_next: Option<Duration>,
}

/// Outcome of recording a failed attempt.
pub(crate) enum Next {
    Retry(Duration),
    Fatal,
    Exhausted,
}

/// Attempt sequence for one call. Created fresh per call, never shared.
pub(crate) struct Attempts<'a> {
    class: &'a OperationClass,
    history: Vec<Attempt>,
    backoff: Duration,
}

impl<'a> Attempts<'a> {
    pub(crate) fn new(class: &'a OperationClass) -> Self {
        Self {
            class,
            history: Vec::new(),
            backoff: Duration::ZERO,
        }
    }

    /// Index of the attempt about to run.
    pub(crate) fn next_index(&self) -> u32 {
        self.history.len() as u32
    }

    pub(crate) fn class_name(&self) -> &'static str {
        self.class.name()
    }

    pub(crate) fn count(&self) -> u32 {
        self.history.len() as u32
    }

    pub(crate) fn succeeded(&mut self) {
        let index = self.next_index();
        self.history.push(Attempt {
            index,
            error: None,
            delay_before_next: None,
        });
        if index > 0 {
            tracing::debug!(class = self.class.name(), attempts = index + 1, "succeeded after retry");
        }
    }

    /// Record a failed attempt and decide what comes next (delay already jittered).
    pub(crate) fn failed(&mut self, fault: &StoreFault, verdict: Verdict) -> Next {
        let policy = self.class.policy();
        let index = self.next_index();
        let (next, delay) = match policy.decide(index, verdict) {
            RetryDecision::Fatal => (Next::Fatal, None),
            RetryDecision::Exhausted => (Next::Exhausted, None),
            RetryDecision::RetryAfter(d) => {
                let d = policy.apply_jitter(d, &mut rand::thread_rng());
                (Next::Retry(d), Some(d))
            }
        };
        if let Some(d) = delay {
            self.backoff = self.backoff.saturating_add(d);
        }
        self.history.push(Attempt {
            index,
            error: Some(fault.clone()),
            delay_before_next: delay,
        });
        next
    }

    pub(crate) fn fatal<E>(&self, fault: E) -> RetryError<E> {
        RetryError::Fatal {
            class: self.class.name(),
            fault,
            attempts: self.count(),
            backoff: self.backoff,
        }
    }

    pub(crate) fn exhausted<E>(&self, last: E) -> RetryError<E> {
        if let Some(a) = self.history.last() {
            tracing::warn!(
                class = self.class.name(),
                attempts = a.index + 1,
                backoff_ms = self.backoff.as_millis() as u64,
                kind = a.error.as_ref().map(StoreFault::kind).unwrap_or_default(),
                "retries exhausted"
            );
        }
        RetryError::Exhausted {
            class: self.class.name(),
            last,
            attempts: self.count(),
            backoff: self.backoff,
        }
    }

    pub(crate) fn cancelled<E>(&self, last: Option<E>) -> RetryError<E> {
        tracing::info!(class = self.class.name(), attempts = self.count(), "retry sequence cancelled");
        RetryError::Cancelled {
            class: self.class.name(),
            last,
            attempts: self.count(),
            backoff: self.backoff,
        }
    }

    pub(crate) fn last(&self) -> Option<&Attempt> {
        self.history.last()
    }
}
