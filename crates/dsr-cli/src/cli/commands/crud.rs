//! `dsr create|read|update|delete` – single-collection operations.

use anyhow::Result;
use dsr_core::store::{doc_id, Document};
use dsr_core::workload::Workload;

pub async fn run_create(workload: &Workload, count: usize) -> Result<()> {
    let ids = workload.create(count).await?;
    println!("Inserted {} user profile(s).", ids.len());
    for id in ids {
        println!("  {id}");
    }
    Ok(())
}

pub async fn run_read(workload: &Workload, age: i64) -> Result<()> {
    let docs = workload.read(age).await?;
    if docs.is_empty() {
        println!("No user profiles with age {age}.");
        return Ok(());
    }
    println!("{:<14} {:<20} {:<5} ADDRESS", "ID", "NAME", "AGE");
    for d in &docs {
        println!(
            "{:<14} {:<20} {:<5} {}",
            doc_id(d).unwrap_or_else(|| "-".to_string()),
            field(d, "name"),
            field(d, "age"),
            field(d, "address"),
        );
    }
    Ok(())
}

pub async fn run_update(workload: &Workload, id: &str) -> Result<()> {
    let r = workload.update(id).await?;
    if r.modified == 0 {
        println!("User profile {id} was not modified.");
    } else {
        println!("Incremented age of user profile {id}.");
    }
    Ok(())
}

pub async fn run_delete(workload: &Workload, name: &str) -> Result<()> {
    match workload.delete(name).await? {
        0 => println!("No user profile named {name:?}."),
        _ => println!("Deleted one user profile named {name:?}."),
    }
    Ok(())
}

fn field(doc: &Document, key: &str) -> String {
    match doc.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}
