//! File-backed log storage for sessions without an identity.
//!
//! The whole collection lives in one JSON array under a fixed file name in
//! the app's private directory. Every mutation is read-modify-write of the
//! full file, written to a sibling temp file and renamed into place.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::config::{StoreConfig, DEFAULT_LOCAL_FILE_NAME};
use crate::error::Result;
use crate::membership::{self, MembershipOutcome};
use crate::models::{Log, LogId, LogPatch};
use crate::ordering::position_priority;

/// On-device log collection
pub struct LocalLogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalLogStore {
    /// Store logs in `data_dir` under the default file name
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_file_name(data_dir, DEFAULT_LOCAL_FILE_NAME)
    }

    pub fn with_file_name(data_dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            path: data_dir.into().join(file_name),
            lock: Mutex::new(()),
        }
    }

    /// Build from config, using `fallback_dir` when no data dir is configured
    pub fn from_config(config: &StoreConfig, fallback_dir: impl Into<PathBuf>) -> Self {
        Self::with_file_name(
            config.resolve_data_dir(fallback_dir),
            &config.local_file_name,
        )
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored log in insertion order; empty when nothing is stored yet.
    pub async fn read_all(&self) -> Vec<Log> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Append one log to the end of the collection
    pub async fn append(&self, log: Log) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut logs = self.load().await;
        tracing::debug!("Appending local log {}", log.id);
        logs.push(log);
        self.store(&logs).await
    }

    /// Replace the whole collection, keeping the given order
    pub async fn overwrite(&self, logs: &[Log]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store(logs).await
    }

    pub async fn find_by_id(&self, id: &LogId) -> Option<Log> {
        self.read_all().await.into_iter().find(|log| &log.id == id)
    }

    pub async fn count(&self) -> usize {
        self.read_all().await.len()
    }

    /// Remove the collection file
    pub async fn delete_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Cleared local logs at {}", self.path.display());
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Add a movie to a log's to-watch set.
    ///
    /// `None` when no log has that id; nothing is written in that case.
    pub async fn add_movie(
        &self,
        log_id: &LogId,
        movie_id: &str,
    ) -> Result<Option<MembershipOutcome>> {
        membership::validate_movie_id(movie_id)?;
        self.modify(log_id, |log| membership::add_movie(log, movie_id))
            .await
    }

    pub async fn mark_watched(
        &self,
        log_id: &LogId,
        movie_id: &str,
    ) -> Result<Option<MembershipOutcome>> {
        membership::validate_movie_id(movie_id)?;
        self.modify(log_id, |log| membership::mark_watched(log, movie_id))
            .await
    }

    pub async fn unmark_watched(
        &self,
        log_id: &LogId,
        movie_id: &str,
    ) -> Result<Option<MembershipOutcome>> {
        membership::validate_movie_id(movie_id)?;
        self.modify(log_id, |log| membership::unmark_watched(log, movie_id))
            .await
    }

    /// Apply a whitelisted patch; returns the updated log
    pub async fn update(&self, log_id: &LogId, patch: &LogPatch) -> Result<Option<Log>> {
        self.modify(log_id, |log| {
            patch.apply_to(log);
            log.clone()
        })
        .await
    }

    /// Delete one log; `false` when it did not exist
    pub async fn delete(&self, log_id: &LogId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut logs = self.load().await;
        let before = logs.len();
        logs.retain(|log| &log.id != log_id);
        if logs.len() == before {
            return Ok(false);
        }
        self.store(&logs).await?;
        Ok(true)
    }

    /// Set each listed log's owner priority to its position in `ordered`.
    ///
    /// The file is rewritten in the new order. Stored logs missing from
    /// `ordered` keep their relative order after the listed ones and are
    /// renumbered to follow them.
    pub async fn rewrite_priorities(&self, ordered: &[LogId]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let stored = self.load().await;
        let stored_order: Vec<LogId> = stored.iter().map(|log| log.id.clone()).collect();
        let mut by_id: HashMap<LogId, Log> = stored
            .into_iter()
            .map(|log| (log.id.clone(), log))
            .collect();

        let mut rewritten = Vec::with_capacity(by_id.len());
        for id in ordered.iter().chain(stored_order.iter()) {
            if let Some(mut log) = by_id.remove(id) {
                log.owner.priority = position_priority(rewritten.len());
                rewritten.push(log);
            }
        }

        self.store(&rewritten).await
    }

    async fn modify<T>(&self, log_id: &LogId, f: impl FnOnce(&mut Log) -> T) -> Result<Option<T>> {
        let _guard = self.lock.lock().await;
        let mut logs = self.load().await;
        let Some(log) = logs.iter_mut().find(|log| &log.id == log_id) else {
            tracing::debug!("Local log {log_id} not found; nothing to update");
            return Ok(None);
        };

        let before = log.clone();
        let output = f(log);
        if *log != before {
            self.store(&logs).await?;
        }
        Ok(Some(output))
    }

    async fn load(&self) -> Vec<Log> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(error) => {
                tracing::warn!(
                    "Failed to read local logs at {}: {}; treating as empty",
                    self.path.display(),
                    error
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Log>>(&bytes) {
            Ok(logs) => logs,
            Err(error) => {
                tracing::warn!(
                    "Failed to parse local logs at {}: {}; treating as empty",
                    self.path.display(),
                    error
                );
                Vec::new()
            }
        }
    }

    async fn store(&self, logs: &[Log]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = serde_json::to_vec_pretty(logs)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, payload).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOCAL_FILE_NAME.to_string());
        self.path.with_file_name(format!("{file_name}.tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieSet;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn names(logs: &[Log]) -> Vec<&str> {
        logs.iter().map(|log| log.name.as_str()).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_all_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        assert!(store.read_all().await.is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_all_with_garbage_is_empty() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        std::fs::write(store.path(), b"[{ broken").unwrap();
        assert!(store.read_all().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn append_preserves_insertion_order() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path().join("nested"));

        store.append(Log::new_local("First", false, 1)).await.unwrap();
        store.append(Log::new_local("Second", false, 2)).await.unwrap();

        let logs = store.read_all().await;
        assert_eq!(names(&logs), vec!["First", "Second"]);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overwrite_replaces_collection() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        store.append(Log::new_local("Old", false, 1)).await.unwrap();

        let replacement = vec![
            Log::new_local("B", false, 0),
            Log::new_local("A", false, 1),
        ];
        store.overwrite(&replacement).await.unwrap();

        assert_eq!(store.read_all().await, replacement);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_by_id_and_delete_all() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let log = Log::new_local("Findable", false, 1);
        store.append(log.clone()).await.unwrap();

        assert_eq!(store.find_by_id(&log.id).await, Some(log));
        assert_eq!(store.find_by_id(&LogId::from("missing")).await, None);

        store.delete_all().await.unwrap();
        assert_eq!(store.count().await, 0);
        store.delete_all().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_movie_sets_presence_flag() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let log = Log::new_local("Movies", false, 1);
        store.append(log.clone()).await.unwrap();

        let outcome = store.add_movie(&log.id, "531330").await.unwrap();
        assert_eq!(outcome, Some(MembershipOutcome::Applied));

        let stored = store.find_by_id(&log.id).await.unwrap();
        assert_eq!(
            stored.movie_ids,
            MovieSet::from([("531330".to_string(), true)])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dotted_movie_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let log = Log::new_local("Movies", false, 1);
        store.append(log.clone()).await.unwrap();

        let error = store.add_movie(&log.id, "tt.1").await.unwrap_err();
        assert!(matches!(error, crate::error::Error::InvalidInput(_)));
        assert!(store.find_by_id(&log.id).await.unwrap().movie_ids.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_movie_to_unknown_log_is_noop() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        store.append(Log::new_local("Only", false, 1)).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let outcome = store.add_movie(&LogId::from("nope"), "1").await.unwrap();
        assert_eq!(outcome, None);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watch_transitions_persist() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let log = Log::new_local("Watching", false, 1);
        store.append(log.clone()).await.unwrap();
        store.add_movie(&log.id, "10").await.unwrap();

        store.mark_watched(&log.id, "10").await.unwrap();
        let stored = store.find_by_id(&log.id).await.unwrap();
        assert!(stored.is_watched("10"));
        assert!(!stored.is_pending("10"));

        let rejected = store.mark_watched(&log.id, "10").await.unwrap();
        assert!(matches!(rejected, Some(MembershipOutcome::Rejected(_))));

        store.unmark_watched(&log.id, "10").await.unwrap();
        let stored = store.find_by_id(&log.id).await.unwrap();
        assert!(stored.is_pending("10"));
        assert!(!stored.is_watched("10"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_and_delete_single_log() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let keep = Log::new_local("Keep", false, 1);
        let drop = Log::new_local("Drop", false, 2);
        store.append(keep.clone()).await.unwrap();
        store.append(drop.clone()).await.unwrap();

        let updated = store
            .update(&keep.id, &LogPatch::default().name("Kept").visibility(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Kept");
        assert!(updated.visibility);

        assert!(store.delete(&drop.id).await.unwrap());
        assert!(!store.delete(&drop.id).await.unwrap());
        assert_eq!(names(&store.read_all().await), vec!["Kept"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rewrite_priorities_follows_given_order() {
        let dir = tempdir().unwrap();
        let store = LocalLogStore::new(dir.path());
        let a = Log::new_local("A", false, 1);
        let b = Log::new_local("B", false, 2);
        let c = Log::new_local("C", false, 3);
        for log in [&a, &b, &c] {
            store.append(log.clone()).await.unwrap();
        }

        store
            .rewrite_priorities(&[c.id.clone(), a.id.clone()])
            .await
            .unwrap();

        let logs = store.read_all().await;
        assert_eq!(names(&logs), vec!["C", "A", "B"]);
        let priorities: Vec<i64> = logs.iter().map(|log| log.owner.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn from_config_uses_configured_file_name() {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            data_dir: Some(dir.path().to_path_buf()),
            local_file_name: "offline.json".to_string(),
            ..StoreConfig::default()
        };
        let store = LocalLogStore::from_config(&config, "/unused");
        assert_eq!(store.path(), dir.path().join("offline.json"));
    }
}
