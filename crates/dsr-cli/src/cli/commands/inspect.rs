//! `dsr classify` and `dsr policies` – no store connection needed.

use anyhow::Result;
use dsr_core::config::DsrConfig;
use dsr_core::fault::{FaultClassifier, SignatureSet, StoreFault};
use dsr_core::retry::{OperationClass, Policies};

pub fn run_classify(cfg: &DsrConfig, kind: &str, message: &str) -> Result<()> {
    let classifier = FaultClassifier::new(SignatureSet::from_config(&cfg.classifier));
    let fault = StoreFault::new(kind, message);
    let verdict = if classifier.classify(&fault).is_retryable() {
        "retryable"
    } else {
        "fatal"
    };
    println!("{kind}: {verdict}");
    Ok(())
}

pub fn run_policies(cfg: &DsrConfig) -> Result<()> {
    let policies = Policies::from_config(&cfg.retry)?;
    println!(
        "{:<12} {:<9} {:<9} {:<9} {:<7} {:<12} SCHEDULE",
        "CLASS", "ATTEMPTS", "BASE", "MAX", "JITTER", "BACKOFF"
    );
    for class in policies.classes() {
        println!("{}", policy_row(&class));
    }
    Ok(())
}

fn policy_row(class: &OperationClass) -> String {
    let p = class.policy();
    let schedule: Vec<String> = (0..p.max_attempts().saturating_sub(1))
        .map(|i| format!("{}ms", p.backoff(i).as_millis()))
        .collect();
    format!(
        "{:<12} {:<9} {:<9} {:<9} {:<7} {:<12} {}",
        class.name(),
        p.max_attempts(),
        format!("{}ms", p.base_delay().as_millis()),
        format!("{}ms", p.max_delay().as_millis()),
        if p.jitter() { "yes" } else { "no" },
        format!("{:?}", p.law()).to_lowercase(),
        if schedule.is_empty() {
            "-".to_string()
        } else {
            schedule.join(", ")
        },
    )
}
