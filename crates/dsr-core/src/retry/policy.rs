//! Retry policies: attempt caps, backoff laws and per-operation-class dispatch.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{RetryConfig, RetryConfigs};
use crate::fault::Verdict;

/// How the pre-jitter delay grows with the attempt index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffLaw {
    /// `base * 2^i`, capped.
    #[default]
    Exponential,
    /// `base * fib(i + 1)` (1, 1, 2, 3, 5, ...), capped.
    Fibonacci,
}

/// Rejected policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    NoAttempts,
    #[error("base delay must be at least 1ms (got {0:?})")]
    BaseDelayTooSmall(Duration),
    #[error("max delay {max:?} is below base delay {base:?}")]
    MaxBelowBase { base: Duration, max: Duration },
}

/// Decision returned by the retry policy for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Fault is not retryable; stop now.
    Fatal,
    /// Fault is retryable but the attempt budget is spent.
    Exhausted,
    /// Retry after the given (pre-jitter) delay.
    RetryAfter(Duration),
}

/// Immutable retry configuration for one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    law: BackoffLaw,
}

impl RetryPolicy {
    /// Exponential policy without jitter. `max_attempts` includes the first attempt.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::NoAttempts);
        }
        if base_delay < Duration::from_millis(1) {
            return Err(PolicyError::BaseDelayTooSmall(base_delay));
        }
        if max_delay < base_delay {
            return Err(PolicyError::MaxBelowBase {
                base: base_delay,
                max: max_delay,
            });
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: false,
            law: BackoffLaw::Exponential,
        })
    }

    /// Reads: one retry after a fixed 1s pause. Read-preference routing is
    /// expected to land the second attempt on a healthy member.
    pub fn read_default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            jitter: false,
            law: BackoffLaw::Exponential,
        }
    }

    /// Writes and transactions: first attempt plus 4 retries, 1s base, 7s cap, jittered.
    pub fn write_default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(7),
            jitter: true,
            law: BackoffLaw::Exponential,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_law(mut self, law: BackoffLaw) -> Self {
        self.law = law;
        self
    }

    pub fn from_config(cfg: &RetryConfig) -> Result<Self, PolicyError> {
        Ok(Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
        )?
        .with_jitter(cfg.jitter)
        .with_law(cfg.backoff))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn law(&self) -> BackoffLaw {
        self.law
    }

    /// Pre-jitter delay after the failed attempt with 0-based `index`.
    ///
    /// Non-decreasing in `index`, never below `base_delay`, never above `max_delay`.
    pub fn backoff(&self, index: u32) -> Duration {
        let factor = match self.law {
            BackoffLaw::Exponential => 1u32 << index.min(31),
            BackoffLaw::Fibonacci => fibonacci(index.saturating_add(1)),
        };
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decide what to do after attempt `index` (0-based) failed with `verdict`.
    pub fn decide(&self, index: u32, verdict: Verdict) -> RetryDecision {
        if !verdict.is_retryable() {
            return RetryDecision::Fatal;
        }
        if index.saturating_add(1) >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.backoff(index))
    }

    /// Uniform draw over `[base_delay, delay]` in whole milliseconds when jitter is on.
    pub fn apply_jitter<R: Rng + ?Sized>(&self, delay: Duration, rng: &mut R) -> Duration {
        if !self.jitter || delay <= self.base_delay {
            return delay;
        }
        let lo = self.base_delay.as_millis() as u64;
        let hi = delay.as_millis() as u64;
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

fn fibonacci(n: u32) -> u32 {
    let (mut a, mut b) = (0u32, 1u32);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// What kind of operation is being retried, carrying the policy to apply.
///
/// Chosen once at the call site; the orchestrator never re-derives it per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Read(RetryPolicy),
    Write(RetryPolicy),
    Transaction(RetryPolicy),
}

impl OperationClass {
    pub fn policy(&self) -> &RetryPolicy {
        match self {
            OperationClass::Read(p) | OperationClass::Write(p) | OperationClass::Transaction(p) => p,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationClass::Read(_) => "read",
            OperationClass::Write(_) => "write",
            OperationClass::Transaction(_) => "transaction",
        }
    }
}

/// One policy per operation class, built once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policies {
    read: RetryPolicy,
    write: RetryPolicy,
    transaction: RetryPolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            read: RetryPolicy::read_default(),
            write: RetryPolicy::write_default(),
            transaction: RetryPolicy::write_default(),
        }
    }
}

impl Policies {
    pub fn new(read: RetryPolicy, write: RetryPolicy, transaction: RetryPolicy) -> Self {
        Self {
            read,
            write,
            transaction,
        }
    }

    pub fn from_config(cfg: &RetryConfigs) -> Result<Self, PolicyError> {
        Ok(Self {
            read: RetryPolicy::from_config(&cfg.read)?,
            write: RetryPolicy::from_config(&cfg.write)?,
            transaction: RetryPolicy::from_config(&cfg.transaction)?,
        })
    }

    pub fn read(&self) -> OperationClass {
        OperationClass::Read(self.read)
    }

    pub fn write(&self) -> OperationClass {
        OperationClass::Write(self.write)
    }

    pub fn transaction(&self) -> OperationClass {
        OperationClass::Transaction(self.transaction)
    }

    /// All three classes, in read/write/transaction order.
    pub fn classes(&self) -> [OperationClass; 3] {
        [self.read(), self.write(), self.transaction()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy::new(5, secs(1), secs(7)).unwrap();
        let delays: Vec<_> = (0..4).map(|i| p.backoff(i)).collect();
        assert_eq!(delays, vec![secs(1), secs(2), secs(4), secs(7)]);
        assert_eq!(p.backoff(30), secs(7));
        assert_eq!(p.backoff(u32::MAX), secs(7));
    }

    #[test]
    fn backoff_is_monotone_positive_and_bounded() {
        for law in [BackoffLaw::Exponential, BackoffLaw::Fibonacci] {
            let p = RetryPolicy::new(50, Duration::from_millis(3), secs(2))
                .unwrap()
                .with_law(law);
            let mut prev = Duration::ZERO;
            for i in 0..64 {
                let d = p.backoff(i);
                assert!(d > Duration::ZERO);
                assert!(d >= prev, "{law:?} not monotone at {i}");
                assert!(d <= p.max_delay());
                prev = d;
            }
        }
    }

    #[test]
    fn fibonacci_law() {
        let p = RetryPolicy::new(8, secs(1), secs(6))
            .unwrap()
            .with_law(BackoffLaw::Fibonacci);
        let delays: Vec<_> = (0..6).map(|i| p.backoff(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 1, 2, 3, 5, 6]);
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::new(3, secs(1), secs(7)).unwrap();
        assert_eq!(p.decide(0, Verdict::Retryable), RetryDecision::RetryAfter(secs(1)));
        assert_eq!(p.decide(1, Verdict::Retryable), RetryDecision::RetryAfter(secs(2)));
        assert_eq!(p.decide(2, Verdict::Retryable), RetryDecision::Exhausted);
    }

    #[test]
    fn fatal_never_retries() {
        let p = RetryPolicy::write_default();
        assert_eq!(p.decide(0, Verdict::Fatal), RetryDecision::Fatal);
    }

    #[test]
    fn single_attempt_policy_exhausts_immediately() {
        let p = RetryPolicy::new(1, secs(1), secs(1)).unwrap();
        assert_eq!(p.decide(0, Verdict::Retryable), RetryDecision::Exhausted);
    }

    #[test]
    fn jitter_stays_within_base_and_delay() {
        let p = RetryPolicy::write_default();
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..4 {
            let d = p.backoff(i);
            for _ in 0..100 {
                let j = p.apply_jitter(d, &mut rng);
                assert!(j >= p.base_delay() && j <= d, "{j:?} outside [{:?}, {d:?}]", p.base_delay());
            }
        }
    }

    #[test]
    fn jitter_off_is_identity() {
        let p = RetryPolicy::write_default().with_jitter(false);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(p.apply_jitter(secs(4), &mut rng), secs(4));
    }

    #[test]
    fn invalid_policies_rejected() {
        assert_eq!(RetryPolicy::new(0, secs(1), secs(1)), Err(PolicyError::NoAttempts));
        assert!(matches!(
            RetryPolicy::new(3, Duration::ZERO, secs(1)),
            Err(PolicyError::BaseDelayTooSmall(_))
        ));
        assert!(matches!(
            RetryPolicy::new(3, secs(2), secs(1)),
            Err(PolicyError::MaxBelowBase { .. })
        ));
    }

    #[test]
    fn default_policies_match_observed_parameters() {
        let p = Policies::default();
        assert_eq!(p.read().policy().max_attempts(), 2);
        assert_eq!(p.write().policy().max_attempts(), 5);
        assert_eq!(p.write().policy().base_delay(), secs(1));
        assert_eq!(p.write().policy().max_delay(), secs(7));
        assert_eq!(p.transaction().name(), "transaction");
    }
}
