//! `dsr transaction` and `dsr demo`.

use anyhow::Result;
use dsr_core::workload::{Workload, DEFAULT_AGE, DEFAULT_DELETE_NAME};

pub async fn run_transaction(workload: &Workload) -> Result<()> {
    let ids = workload.transaction().await?;
    println!("Committed transaction: {}", ids.join(", "));
    Ok(())
}

pub async fn run_demo(workload: &Workload) -> Result<()> {
    let report = workload.run_all().await?;
    println!("create:      {} user profile(s)", report.inserted.len());
    println!("read:        {} with age {}", report.read, DEFAULT_AGE);
    match (&report.updated, report.inserted.first()) {
        (Some(u), Some(id)) => println!("update:      {id} (modified {})", u.modified),
        _ => println!("update:      skipped"),
    }
    println!("delete:      {} named {:?}", report.deleted, DEFAULT_DELETE_NAME);
    println!("transaction: {}", report.transaction.join(", "));
    Ok(())
}
