//! Retry loop: run an operation until success, a fatal fault, an exhausted
//! budget, or cancellation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::fault::{AsFault, FaultClassifier};
use crate::store::DocId;
use crate::txn::{TransactionAborted, TransactionalUnit, TxStep};

use super::attempt::{Attempts, Next};
use super::error::RetryError;
use super::policy::OperationClass;

/// Longest uninterrupted thread sleep in the blocking driver, so cancellation is noticed.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Drives operations through their retry policy.
///
/// Holds only the immutable classifier, so one instance can be cloned and
/// shared across tasks; every call keeps its own attempt sequence.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    classifier: Arc<FaultClassifier>,
}

impl Orchestrator {
    pub fn new(classifier: Arc<FaultClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &FaultClassifier {
        &self.classifier
    }

    /// Run `op` under the policy carried by `class`, sleeping between
    /// retryable failures with `tokio::time::sleep`.
    ///
    /// `cancel` is checked before every attempt and raced against every
    /// backoff sleep.
    pub async fn execute<T, E, F, Fut>(
        &self,
        class: &OperationClass,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsFault,
    {
        let mut attempts = Attempts::new(class);
        let mut last: Option<E> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(attempts.cancelled(last));
            }
            tracing::debug!(class = class.name(), attempt = attempts.next_index(), "attempting");
            match op().await {
                Ok(value) => {
                    attempts.succeeded();
                    return Ok(value);
                }
                Err(e) => {
                    let (delay, e) = self.settle(&mut attempts, e)?;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(attempts.cancelled(Some(e))),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    last = Some(e);
                }
            }
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute): same attempt
    /// sequence and decisions, but sleeps the calling thread.
    pub fn execute_blocking<T, E, F>(
        &self,
        class: &OperationClass,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: AsFault,
    {
        let mut attempts = Attempts::new(class);
        let mut last: Option<E> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(attempts.cancelled(last));
            }
            tracing::debug!(class = class.name(), attempt = attempts.next_index(), "attempting");
            match op() {
                Ok(value) => {
                    attempts.succeeded();
                    return Ok(value);
                }
                Err(e) => {
                    let (delay, e) = self.settle(&mut attempts, e)?;
                    if sleep_blocking(delay, cancel) {
                        return Err(attempts.cancelled(Some(e)));
                    }
                    last = Some(e);
                }
            }
        }
    }

    /// Run a transactional unit as one retryable operation under `class`.
    ///
    /// The whole transaction restarts from its first step on every retry, so
    /// `steps` must carry pre-generated document ids to stay idempotent.
    pub async fn run_transaction(
        &self,
        unit: &TransactionalUnit,
        class: &OperationClass,
        steps: &[TxStep],
        cancel: &CancellationToken,
    ) -> Result<Vec<DocId>, RetryError<TransactionAborted>> {
        self.execute(class, cancel, || async move { unit.run(steps).await.into_result() })
            .await
    }

    /// Classify a failed attempt. `Ok` means sleep for the delay and retry.
    fn settle<E: AsFault>(
        &self,
        attempts: &mut Attempts<'_>,
        err: E,
    ) -> Result<(Duration, E), RetryError<E>> {
        let next = {
            let fault = err.as_fault();
            let verdict = self.classifier.classify(fault);
            attempts.failed(fault, verdict)
        };
        match next {
            Next::Retry(delay) => {
                if let Some(a) = attempts.last() {
                    tracing::info!(
                        class = attempts.class_name(),
                        attempt = a.index,
                        delay_ms = a.delay_before_next.unwrap_or_default().as_millis() as u64,
                        kind = a.error.as_ref().map(|f| f.kind()).unwrap_or_default(),
                        "retrying after transient fault"
                    );
                }
                Ok((delay, err))
            }
            Next::Fatal => {
                let fault = err.as_fault();
                tracing::error!(
                    class = attempts.class_name(),
                    attempt = attempts.count() - 1,
                    kind = fault.kind(),
                    "fault not eligible for retry: {}",
                    fault.message()
                );
                Err(attempts.fatal(err))
            }
            Next::Exhausted => Err(attempts.exhausted(err)),
        }
    }
}

/// Sleep for `delay` in short slices. Returns true if cancelled first.
fn sleep_blocking(delay: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
