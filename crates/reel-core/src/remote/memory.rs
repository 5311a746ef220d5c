//! In-process `DocumentStore` implementation.
//!
//! Used by tests and as an offline emulator of the remote service. State can
//! be snapshotted to a JSON file so a CLI session survives restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use uuid::Uuid;

use super::document::{
    apply_field_update, matches_filter, Document, DocumentStore, FieldUpdate, Filter, WriteBatch,
    WriteOp,
};
use crate::error::{Error, Result};

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// Document collections held in memory
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    write_budget: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self {
            collections: Mutex::new(Collections::new()),
            write_budget: AtomicUsize::new(usize::MAX),
        }
    }
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by `save_snapshot`; a missing file starts empty.
    pub async fn open_snapshot(path: &Path) -> Result<Self> {
        let collections = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice::<Collections>(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Collections::new(),
            Err(error) => return Err(error.into()),
        };
        tracing::debug!(
            "Opened document snapshot {} ({} collection(s))",
            path.display(),
            collections.len()
        );

        Ok(Self {
            collections: Mutex::new(collections),
            ..Self::default()
        })
    }

    /// Persist every collection to `path`, replacing it in one rename
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let payload = {
            let collections = self.collections.lock().await;
            serde_json::to_vec_pretty(&*collections)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = snapshot_temp_path(path);
        tokio::fs::write(&temp_path, payload).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Let `successful` more writes through, then fail every write after.
    pub fn fail_writes_after(&self, successful: usize) {
        self.write_budget.store(successful, Ordering::SeqCst);
    }

    /// Remove any write failure injected by `fail_writes_after`
    pub fn restore_writes(&self) {
        self.write_budget.store(usize::MAX, Ordering::SeqCst);
    }

    /// Every document in a collection, ordered by id
    pub async fn documents(&self, collection: &str) -> Vec<(String, Document)> {
        let collections = self.collections.lock().await;
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn consume_write(&self) -> Result<()> {
        let allowed = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                match budget {
                    0 => None,
                    usize::MAX => Some(usize::MAX),
                    remaining => Some(remaining - 1),
                }
            })
            .is_ok();

        if allowed {
            Ok(())
        } else {
            Err(Error::RequestFailed(
                "document store unavailable (injected failure)".to_string(),
            ))
        }
    }
}

fn snapshot_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "snapshot".to_string(), |name| name.to_string_lossy().into_owned());
    path.with_file_name(format!("{file_name}.tmp"))
}

fn update_document(
    docs: &mut BTreeMap<String, Document>,
    id: &str,
    fields: &[(String, FieldUpdate)],
) -> Result<()> {
    let document = docs
        .get_mut(id)
        .ok_or_else(|| Error::NotFound(format!("document {id}")))?;
    for (path, update) in fields {
        apply_field_update(document, path, update);
    }
    Ok(())
}

impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, collection: &str, document: Document) -> Result<String> {
        self.consume_write()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<(String, Document)>> {
        let collections = self.collections.lock().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|filter| matches_filter(doc, filter)))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<(String, FieldUpdate)>,
    ) -> Result<()> {
        self.consume_write()?;
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();
        update_document(docs, id, &fields)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.consume_write()?;
        let mut collections = self.collections.lock().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn commit(&self, collection: &str, batch: WriteBatch) -> Result<()> {
        self.consume_write()?;
        let mut collections = self.collections.lock().await;
        let mut staged = collections.get(collection).cloned().unwrap_or_default();

        for op in batch.into_ops() {
            match op {
                WriteOp::Update { id, fields } => update_document(&mut staged, &id, &fields)?,
                WriteOp::Delete { id } => {
                    staged.remove(&id);
                }
            }
        }

        collections.insert(collection.to_string(), staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_get_delete() {
        let store = MemoryDocumentStore::new();
        let id = store.add("logs", doc(json!({ "name": "A" }))).await.unwrap();

        let fetched = store.get("logs", &id).await.unwrap().unwrap();
        assert_eq!(fetched["name"], json!("A"));

        store.delete("logs", &id).await.unwrap();
        assert!(store.get("logs", &id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ids_are_unique() {
        let store = MemoryDocumentStore::new();
        let a = store.add("logs", Document::new()).await.unwrap();
        let b = store.add("logs", Document::new()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let error = store
            .update("logs", "ghost", vec![("name".into(), FieldUpdate::Set(json!("x")))])
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_is_all_or_nothing() {
        let store = MemoryDocumentStore::new();
        let id = store.add("logs", doc(json!({ "n": 1 }))).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.update(id.clone(), vec![("n".into(), FieldUpdate::Increment(1))]);
        batch.update("ghost", vec![("n".into(), FieldUpdate::Increment(1))]);
        assert!(store.commit("logs", batch).await.is_err());

        let unchanged = store.get("logs", &id).await.unwrap().unwrap();
        assert_eq!(unchanged["n"], json!(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_applies_all_filters() {
        let store = MemoryDocumentStore::new();
        store
            .add("logs", doc(json!({ "owner": { "userId": "u" }, "visibility": true })))
            .await
            .unwrap();
        store
            .add("logs", doc(json!({ "owner": { "userId": "u" }, "visibility": false })))
            .await
            .unwrap();
        store
            .add("logs", doc(json!({ "owner": { "userId": "v" }, "visibility": true })))
            .await
            .unwrap();

        let owned = store
            .query("logs", &[Filter::Equals("owner.userId".into(), json!("u"))])
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);

        let public = store
            .query(
                "logs",
                &[
                    Filter::Equals("owner.userId".into(), json!("u")),
                    Filter::Equals("visibility".into(), json!(true)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn injected_failures_block_writes_only() {
        let store = MemoryDocumentStore::new();
        store.fail_writes_after(1);

        let id = store.add("logs", Document::new()).await.unwrap();
        assert!(store.add("logs", Document::new()).await.is_err());
        assert!(store.get("logs", &id).await.unwrap().is_some());

        store.restore_writes();
        assert!(store.add("logs", Document::new()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");

        let store = MemoryDocumentStore::open_snapshot(&path).await.unwrap();
        let id = store.add("logs", doc(json!({ "name": "Kept" }))).await.unwrap();
        store.save_snapshot(&path).await.unwrap();

        let reopened = MemoryDocumentStore::open_snapshot(&path).await.unwrap();
        let documents = reopened.documents("logs").await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].0, id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_save_replaces_file_without_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.json");
        tokio::fs::write(&path, b"stale").await.unwrap();

        let store = MemoryDocumentStore::new();
        store.add("logs", doc(json!({ "name": "Fresh" }))).await.unwrap();
        store.save_snapshot(&path).await.unwrap();

        assert!(!dir.path().join("remote.json.tmp").exists());
        let reopened = MemoryDocumentStore::open_snapshot(&path).await.unwrap();
        assert_eq!(reopened.documents("logs").await.len(), 1);
    }
}
