//! Classify store faults as retryable or fatal against a closed signature set.

use std::collections::HashSet;

use crate::config::ClassifierConfig;

use super::error::{kinds, StoreFault};

/// Outcome of classifying a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Transient; the operation may be attempted again.
    Retryable,
    /// Retrying cannot help; surface immediately.
    Fatal,
}

impl Verdict {
    pub fn is_retryable(self) -> bool {
        matches!(self, Verdict::Retryable)
    }
}

/// Closed set of transient fault signatures: exact type identifiers and exact messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    kinds: HashSet<String>,
    messages: HashSet<String>,
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::transient()
    }
}

impl SignatureSet {
    /// The built-in transient set: socket open/read failures, not-primary,
    /// node recovering. The same identifiers are accepted as exact messages,
    /// for drivers that report the condition only in the message text.
    pub fn transient() -> Self {
        let kinds: HashSet<String> = [
            kinds::SOCKET_OPEN,
            kinds::SOCKET_READ,
            kinds::NOT_PRIMARY,
            kinds::NODE_IS_RECOVERING,
        ]
        .into_iter()
        .map(String::from)
        .collect();
        Self {
            messages: kinds.clone(),
            kinds,
        }
    }

    /// Built-in set extended with the kinds and messages listed in config.
    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        let mut set = Self::transient();
        set.kinds.extend(cfg.extra_kinds.iter().cloned());
        set.messages.extend(cfg.extra_messages.iter().cloned());
        set
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.insert(kind.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.insert(message.into());
        self
    }

    pub fn contains_kind(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn contains_message(&self, message: &str) -> bool {
        self.messages.contains(message)
    }

    /// Known kinds, sorted (for display).
    pub fn kinds(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.kinds.iter().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

/// Pure classifier over an immutable signature set. Unknown faults are fatal.
#[derive(Debug, Clone, Default)]
pub struct FaultClassifier {
    signatures: SignatureSet,
}

impl FaultClassifier {
    pub fn new(signatures: SignatureSet) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn classify(&self, fault: &StoreFault) -> Verdict {
        if self.signatures.contains_kind(fault.kind())
            || self.signatures.contains_message(fault.message())
        {
            Verdict::Retryable
        } else {
            Verdict::Fatal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_signatures_are_retryable_everything_else_fatal() {
        let c = FaultClassifier::default();
        let table = [
            (kinds::SOCKET_OPEN, Verdict::Retryable),
            (kinds::SOCKET_READ, Verdict::Retryable),
            (kinds::NOT_PRIMARY, Verdict::Retryable),
            (kinds::NODE_IS_RECOVERING, Verdict::Retryable),
            (kinds::POOL_TIMED_OUT, Verdict::Fatal),
            (kinds::DUPLICATE_KEY, Verdict::Fatal),
            (kinds::INVALID_DOCUMENT, Verdict::Fatal),
            (kinds::INTERNAL, Verdict::Fatal),
            ("Unauthorized", Verdict::Fatal),
            ("", Verdict::Fatal),
        ];
        for (kind, expected) in table {
            let fault = StoreFault::new(kind, "boom");
            assert_eq!(c.classify(&fault), expected, "kind {kind:?}");
        }
    }

    #[test]
    fn kind_match_is_exact() {
        let c = FaultClassifier::default();
        assert_eq!(c.classify(&StoreFault::new("notprimary", "x")), Verdict::Fatal);
        assert_eq!(c.classify(&StoreFault::new("NotPrimaryX", "x")), Verdict::Fatal);
    }

    #[test]
    fn message_match_is_exact() {
        let c = FaultClassifier::new(SignatureSet::transient().with_message("node is shutting down"));
        assert_eq!(
            c.classify(&StoreFault::new("Other", "node is shutting down")),
            Verdict::Retryable
        );
        assert_eq!(
            c.classify(&StoreFault::new("Other", "node is shutting down now")),
            Verdict::Fatal
        );
    }

    #[test]
    fn builtin_identifiers_match_as_messages() {
        let c = FaultClassifier::default();
        for sig in [
            kinds::SOCKET_OPEN,
            kinds::SOCKET_READ,
            kinds::NOT_PRIMARY,
            kinds::NODE_IS_RECOVERING,
        ] {
            assert!(c.classify(&StoreFault::new("Wrapped", sig)).is_retryable(), "{sig}");
        }
        assert_eq!(
            c.classify(&StoreFault::new("Wrapped", "NotPrimary: stepped down")),
            Verdict::Fatal
        );
    }

    #[test]
    fn same_fault_same_verdict() {
        let c = FaultClassifier::default();
        let f = StoreFault::new(kinds::SOCKET_READ, "reset by peer");
        let first = c.classify(&f);
        for _ in 0..10 {
            assert_eq!(c.classify(&f), first);
        }
    }

    #[test]
    fn config_extends_set() {
        let cfg = ClassifierConfig {
            extra_kinds: vec![kinds::POOL_TIMED_OUT.to_string()],
            extra_messages: vec!["try again".to_string()],
        };
        let c = FaultClassifier::new(SignatureSet::from_config(&cfg));
        assert!(c.classify(&StoreFault::new(kinds::POOL_TIMED_OUT, "")).is_retryable());
        assert!(c.classify(&StoreFault::new("Whatever", "try again")).is_retryable());
        assert!(c.classify(&StoreFault::new(kinds::NOT_PRIMARY, "")).is_retryable());
    }
}
