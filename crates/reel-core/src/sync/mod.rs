//! One-shot migration of offline logs into the remote store on sign-in.

use crate::error::{Error, Result};
use crate::local::LocalLogStore;
use crate::models::LogId;
use crate::remote::{DocumentStore, RemoteLogStore};

/// A local log and the remote id it was recreated under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedLog {
    pub local_id: LogId,
    pub remote_id: LogId,
}

/// Outcome of a completed migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub migrated: Vec<MigratedLog>,
}

impl SyncReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty()
    }
}

/// Moves every local log into the remote store, then clears local storage.
///
/// Local logs are only cleared once every remote creation succeeded. A failed
/// run leaves them in place, so retrying recreates all of them again and can
/// duplicate the ones that made it the first time.
pub struct LogSynchronizer<'a, D> {
    local: &'a LocalLogStore,
    remote: &'a RemoteLogStore<D>,
}

impl<'a, D: DocumentStore> LogSynchronizer<'a, D> {
    pub const fn new(local: &'a LocalLogStore, remote: &'a RemoteLogStore<D>) -> Self {
        Self { local, remote }
    }

    /// Recreate all local logs as private logs owned by `user_id`
    pub async fn migrate(&self, user_id: &str) -> Result<SyncReport> {
        let logs = self.local.read_all().await;
        if logs.is_empty() {
            tracing::debug!("No local logs to migrate for user {user_id}");
            return Ok(SyncReport::default());
        }

        tracing::info!("Migrating {} local log(s) for user {user_id}", logs.len());
        let mut report = SyncReport::default();

        for log in &logs {
            let created = self
                .remote
                .create_synced(
                    &log.name,
                    user_id,
                    log.owner.priority,
                    &log.creation_date,
                    &log.movie_ids,
                    &log.watched_ids,
                )
                .await;

            match created {
                Ok(remote_id) => report.migrated.push(MigratedLog {
                    local_id: log.id.clone(),
                    remote_id,
                }),
                Err(error) => {
                    tracing::warn!(
                        "Migration of local log {} failed; keeping local logs: {}",
                        log.id,
                        error
                    );
                    return Err(migration_error(report.len(), error));
                }
            }
        }

        self.local
            .delete_all()
            .await
            .map_err(|error| migration_error(report.len(), error))?;

        tracing::info!("Migrated {} local log(s) for user {user_id}", report.len());
        Ok(report)
    }
}

fn migration_error(created: usize, source: Error) -> Error {
    Error::Migration {
        created,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Log;
    use crate::remote::MemoryDocumentStore;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn local_log(name: &str, priority: i64, pending: &[&str], watched: &[&str]) -> Log {
        let mut log = Log::new_local(name, true, priority);
        log.creation_date = format!("17000000000{priority:02}");
        for id in pending {
            log.movie_ids.insert((*id).to_string(), true);
        }
        for id in watched {
            log.watched_ids.insert((*id).to_string(), true);
        }
        log
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn migrate_moves_everything_and_clears_local() {
        let dir = tempdir().unwrap();
        let local = LocalLogStore::new(dir.path());
        let remote = RemoteLogStore::new(MemoryDocumentStore::new());

        let originals = vec![
            local_log("First", 1, &["531330"], &["11"]),
            local_log("Second", 2, &[], &["12", "13"]),
            local_log("Third", 3, &["14"], &[]),
        ];
        local.overwrite(&originals).await.unwrap();

        let report = LogSynchronizer::new(&local, &remote)
            .migrate("user-1")
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(local.count().await, 0);

        for (original, migrated) in originals.iter().zip(&report.migrated) {
            assert_eq!(migrated.local_id, original.id);
            let created = remote.get(&migrated.remote_id).await.unwrap();
            assert_ne!(created.id, original.id);
            assert_eq!(created.name, original.name);
            assert_eq!(created.owner.user_id, "user-1");
            assert_eq!(created.owner.priority, original.owner.priority);
            assert_eq!(created.creation_date, original.creation_date);
            assert_eq!(created.movie_ids, original.movie_ids);
            assert_eq!(created.watched_ids, original.watched_ids);
            assert!(!created.visibility);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn migrate_with_no_local_logs_is_empty() {
        let dir = tempdir().unwrap();
        let local = LocalLogStore::new(dir.path());
        let remote = RemoteLogStore::new(MemoryDocumentStore::new());

        let report = LogSynchronizer::new(&local, &remote)
            .migrate("user-1")
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(remote.document_store().documents("logs").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_creation_keeps_local_logs() {
        let dir = tempdir().unwrap();
        let local = LocalLogStore::new(dir.path());
        let remote = RemoteLogStore::new(MemoryDocumentStore::new());
        let originals = vec![local_log("A", 1, &["1"], &[]), local_log("B", 2, &[], &[])];
        local.overwrite(&originals).await.unwrap();

        remote.document_store().fail_writes_after(1);
        let error = LogSynchronizer::new(&local, &remote)
            .migrate("user-1")
            .await
            .unwrap_err();

        match error {
            Error::Migration { created, source } => {
                assert_eq!(created, 1);
                assert!(matches!(*source, Error::FailedTransaction(_)));
            }
            other => panic!("expected migration error, got {other:?}"),
        }
        assert_eq!(local.read_all().await, originals);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_after_failure_recreates_all_logs() {
        let dir = tempdir().unwrap();
        let local = LocalLogStore::new(dir.path());
        let remote = RemoteLogStore::new(MemoryDocumentStore::new());
        local
            .overwrite(&[local_log("A", 1, &[], &[]), local_log("B", 2, &[], &[])])
            .await
            .unwrap();

        remote.document_store().fail_writes_after(1);
        let synchronizer = LogSynchronizer::new(&local, &remote);
        assert!(synchronizer.migrate("user-1").await.is_err());

        remote.document_store().restore_writes();
        let report = synchronizer.migrate("user-1").await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(local.count().await, 0);
        // The first attempt's "A" is still there: migration is not exactly-once.
        assert_eq!(remote.document_store().documents("logs").await.len(), 3);
    }
}
