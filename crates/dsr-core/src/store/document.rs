//! Documents, equality filters and update operators.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::fault::{kinds, StoreFault};

/// A JSON object. The `_id` field holds the document identifier.
pub type Document = Map<String, Value>;

/// Document identifier (string form of `_id`).
pub type DocId = String;

const ID: &str = "_id";

/// Fresh random identifier.
pub fn new_id() -> DocId {
    uuid::Uuid::new_v4().to_string()
}

/// String form of a document's `_id`, if it has a usable one.
pub fn doc_id(doc: &Document) -> Option<DocId> {
    match doc.get(ID)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Return the document's id, assigning a fresh one when `_id` is absent.
pub fn ensure_id(doc: &mut Document) -> Result<DocId, StoreFault> {
    if !doc.contains_key(ID) {
        let id = new_id();
        doc.insert(ID.to_string(), Value::String(id.clone()));
        return Ok(id);
    }
    doc_id(doc).ok_or_else(|| {
        StoreFault::new(kinds::INVALID_DOCUMENT, "_id must be a string or a number")
    })
}

/// Equality filter on top-level fields. An array field matches when it
/// contains the value. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::eq(ID, id.into())
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0.iter().all(|(field, want)| match doc.get(field) {
            Some(Value::Array(items)) if !want.is_array() => items.contains(want),
            Some(have) => have == want,
            None => false,
        })
    }

    /// Document an upsert starts from: the filter's equality fields.
    pub(crate) fn seed(&self) -> Document {
        self.0.clone()
    }
}

/// Update operators applied to a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    inc: BTreeMap<String, i64>,
    add_to_set: Document,
    pull: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$set`
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// `$inc`; a missing field starts from zero.
    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.insert(field.into(), by);
        self
    }

    /// `$addToSet`; a missing field becomes a one-element array.
    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.insert(field.into(), value.into());
        self
    }

    /// `$pull`: remove every array element equal to the value.
    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.add_to_set.is_empty() && self.pull.is_empty()
    }

    /// Apply to `doc` in place. Returns whether anything changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, StoreFault> {
        if self.set.contains_key(ID) {
            return Err(StoreFault::new(kinds::INVALID_DOCUMENT, "_id is immutable"));
        }
        let before = doc.clone();

        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }
        for (field, by) in &self.inc {
            let current = match doc.get(field) {
                None => 0,
                Some(Value::Number(n)) => n.as_i64().ok_or_else(|| mismatch(field, "$inc"))?,
                Some(_) => return Err(mismatch(field, "$inc")),
            };
            doc.insert(field.clone(), Value::from(current.saturating_add(*by)));
        }
        for (field, value) in &self.add_to_set {
            match doc.get_mut(field) {
                None => {
                    doc.insert(field.clone(), Value::Array(vec![value.clone()]));
                }
                Some(Value::Array(items)) => {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                Some(_) => return Err(mismatch(field, "$addToSet")),
            }
        }
        for (field, value) in &self.pull {
            match doc.get_mut(field) {
                None => {}
                Some(Value::Array(items)) => items.retain(|v| v != value),
                Some(_) => return Err(mismatch(field, "$pull")),
            }
        }

        Ok(*doc != before)
    }
}

fn mismatch(field: &str, op: &str) -> StoreFault {
    StoreFault::new(
        kinds::TYPE_MISMATCH,
        format!("cannot apply {op} to non-conforming field '{field}'"),
    )
}
