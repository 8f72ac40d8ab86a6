//! Generated user-profile and personalization documents.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use crate::store::{new_id, DocId, Document};

const FIRST_NAMES: &[&str] = &[
    "Shaun", "Alma", "Devon", "Greta", "Imani", "Kenji", "Lucia", "Marek", "Noor", "Otis",
];
const LAST_NAMES: &[&str] = &[
    "Feest", "Abbott", "Brekke", "Collins", "Dietrich", "Hahn", "Kuhic", "Nolan", "Price", "Zulauf",
];
const STREETS: &[&str] = &[
    "Maple Avenue",
    "Harbor Lane",
    "Quarry Road",
    "Juniper Court",
    "Station Street",
    "Willow Way",
];

pub const CAMPAIGNS: [&str; 2] = ["CROSS_SELL", "UP_SELL"];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Phone-number-shaped identifier, e.g. `555-014-2290`.
fn phone_id<R: Rng + ?Sized>(rng: &mut R) -> DocId {
    format!(
        "{}-{:03}-{:04}",
        rng.gen_range(200..1000),
        rng.gen_range(0..1000),
        rng.gen_range(0..10_000)
    )
}

/// One user profile: `_id`, `name`, `address`, `age` in 10..90.
pub fn user_profile<R: Rng + ?Sized>(rng: &mut R) -> Document {
    let doc = json!({
        "_id": phone_id(rng),
        "name": format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
        "address": format!("{} {}", rng.gen_range(1..9999), pick(rng, STREETS)),
        "age": rng.gen_range(10..90),
    });
    into_document(doc)
}

pub fn user_profiles<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Document> {
    (0..count).map(|_| user_profile(rng)).collect()
}

/// Personalization record pointing at `user_id`, stamped with the current time.
pub fn personalization(user_id: &str) -> Document {
    let doc = json!({
        "_id": new_id(),
        "user_id": user_id,
        "campaign": CAMPAIGNS,
        "notificationDate": now_millis(),
    });
    into_document(doc)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn into_document(v: Value) -> Document {
    match v {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
