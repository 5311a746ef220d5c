//! Generic document-store contract the remote log store is written against.

use serde_json::{Map, Value};

use crate::error::Result;

/// A stored document: a JSON object addressed by dotted field paths
pub type Document = Map<String, Value>;

/// Field-level write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set the field, creating intermediate maps as needed
    Set(Value),
    /// Remove the field entirely (distinct from setting it to null)
    Delete,
    /// Add to a numeric field, treating a missing field as 0
    Increment(i64),
}

/// Query predicate on a dotted field path
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equals(String, Value),
    /// Field is present and not null
    Exists(String),
}

/// One operation in a multi-document write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Update {
        id: String,
        fields: Vec<(String, FieldUpdate)>,
    },
    Delete {
        id: String,
    },
}

/// Multi-document write applied all-or-nothing by `DocumentStore::commit`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, id: impl Into<String>, fields: Vec<(String, FieldUpdate)>) {
        self.ops.push(WriteOp::Update {
            id: id.into(),
            fields,
        });
    }

    pub fn delete(&mut self, id: impl Into<String>) {
        self.ops.push(WriteOp::Delete { id: id.into() });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// CRUD access to a shared document collection.
///
/// Implementations report missing documents as `Error::NotFound`, and any
/// other failure as `Error::RequestFailed` or `Error::FailedTransaction`.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Insert a document under a store-assigned id
    async fn add(&self, collection: &str, document: Document) -> Result<String>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// All documents matching every filter
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<(String, Document)>>;

    /// Apply field-level writes to an existing document
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<(String, FieldUpdate)>,
    ) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Apply every operation in `batch`, or none of them
    async fn commit(&self, collection: &str, batch: WriteBatch) -> Result<()>;
}

/// Read a dotted path such as `collaborators.u1.priority`
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = document.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.as_object()?.get(segment))
}

/// Write a dotted path, replacing non-object intermediates with maps
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set_in(document, &segments, value);
}

/// Remove a dotted path; missing paths are ignored
pub fn remove_path(document: &mut Document, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    remove_in(document, &segments);
}

/// Apply one field update to a document
pub fn apply_field_update(document: &mut Document, path: &str, update: &FieldUpdate) {
    match update {
        FieldUpdate::Set(value) => set_path(document, path, value.clone()),
        FieldUpdate::Delete => remove_path(document, path),
        FieldUpdate::Increment(by) => {
            let next = incremented(get_path(document, path), *by);
            set_path(document, path, next);
        }
    }
}

/// Whether a document satisfies a filter
pub fn matches_filter(document: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::Equals(path, expected) => get_path(document, path) == Some(expected),
        Filter::Exists(path) => get_path(document, path).is_some_and(|value| !value.is_null()),
    }
}

fn set_in(map: &mut Document, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            map.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_in(child, rest, value);
            }
        }
    }
}

fn remove_in(map: &mut Document, segments: &[&str]) {
    match segments {
        [] => {}
        [leaf] => {
            map.remove(*leaf);
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(child)) = map.get_mut(*head) {
                remove_in(child, rest);
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn incremented(current: Option<&Value>, by: i64) -> Value {
    match current {
        Some(Value::Number(number)) => number.as_i64().map_or_else(
            || Value::from(number.as_f64().unwrap_or(0.0) + by as f64),
            |value| Value::from(value.saturating_add(by)),
        ),
        _ => Value::from(by),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let document = doc(json!({ "collaborators": { "u1": { "priority": 4 } } }));
        assert_eq!(
            get_path(&document, "collaborators.u1.priority"),
            Some(&json!(4))
        );
        assert_eq!(get_path(&document, "collaborators.u2.priority"), None);
        assert_eq!(get_path(&document, "collaborators.u1.priority.x"), None);
    }

    #[test]
    fn set_path_creates_intermediate_maps() {
        let mut document = Document::new();
        set_path(&mut document, "collaborators.u1.priority", json!(2));
        assert_eq!(
            Value::Object(document),
            json!({ "collaborators": { "u1": { "priority": 2 } } })
        );
    }

    #[test]
    fn set_path_replaces_scalar_intermediates() {
        let mut document = doc(json!({ "owner": 5 }));
        set_path(&mut document, "owner.priority", json!(1));
        assert_eq!(Value::Object(document), json!({ "owner": { "priority": 1 } }));
    }

    #[test]
    fn delete_removes_field_instead_of_nulling() {
        let mut document = doc(json!({ "movieIds": { "1": true, "2": true } }));
        apply_field_update(&mut document, "movieIds.1", &FieldUpdate::Delete);
        assert_eq!(Value::Object(document), json!({ "movieIds": { "2": true } }));
    }

    #[test]
    fn increment_handles_missing_integer_and_float() {
        let mut document = doc(json!({ "a": 1, "b": 1.5 }));
        apply_field_update(&mut document, "a", &FieldUpdate::Increment(2));
        apply_field_update(&mut document, "b", &FieldUpdate::Increment(1));
        apply_field_update(&mut document, "c", &FieldUpdate::Increment(3));
        assert_eq!(
            Value::Object(document),
            json!({ "a": 3, "b": 2.5, "c": 3 })
        );
    }

    #[test]
    fn filters_match_equals_and_exists() {
        let document = doc(json!({
            "visibility": true,
            "owner": { "userId": "u1" },
            "collaborators": { "u2": { "priority": 0 }, "u3": null },
        }));

        assert!(matches_filter(
            &document,
            &Filter::Equals("owner.userId".into(), json!("u1"))
        ));
        assert!(!matches_filter(
            &document,
            &Filter::Equals("visibility".into(), json!(false))
        ));
        assert!(matches_filter(
            &document,
            &Filter::Exists("collaborators.u2".into())
        ));
        assert!(!matches_filter(
            &document,
            &Filter::Exists("collaborators.u3".into())
        ));
        assert!(!matches_filter(
            &document,
            &Filter::Exists("collaborators.u4".into())
        ));
    }

    #[test]
    fn write_batch_collects_ops() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.update("a", vec![("name".into(), FieldUpdate::Set(json!("x")))]);
        batch.delete("b");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[1], WriteOp::Delete { id: "b".into() });
    }
}
