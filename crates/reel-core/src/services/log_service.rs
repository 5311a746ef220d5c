//! Log operations routed to local or remote storage by sign-in state.

use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::local::LocalLogStore;
use crate::membership::{self, MembershipOutcome};
use crate::models::{Log, LogId, LogPatch, LOCAL_OWNER_ID};
use crate::ordering::{apply_positions, next_priority, order_entries, reorder, sort_for_user};
use crate::remote::{DocumentStore, NewLog, RemoteLogStore};
use crate::state::SyncState;
use crate::sync::{LogSynchronizer, SyncReport};
use crate::util::normalize_text_option;

/// Single entry point for clients.
///
/// Without an identity every call goes to the local store. Once signed in,
/// calls go to the remote store and local logs are migrated once.
pub struct LogService<D> {
    local: LocalLogStore,
    remote: RemoteLogStore<D>,
    user: RwLock<Option<String>>,
    state: RwLock<SyncState>,
}

impl<D: DocumentStore> LogService<D> {
    pub fn new(local: LocalLogStore, remote: RemoteLogStore<D>) -> Self {
        Self {
            local,
            remote,
            user: RwLock::new(None),
            state: RwLock::new(SyncState::Offline),
        }
    }

    pub const fn local(&self) -> &LocalLogStore {
        &self.local
    }

    pub const fn remote(&self) -> &RemoteLogStore<D> {
        &self.remote
    }

    pub async fn current_user(&self) -> Option<String> {
        self.user.read().await.clone()
    }

    pub async fn sync_state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Restore a previous session without migrating.
    ///
    /// Local logs left behind by a failed migration put the state in `Error`
    /// until `sign_in` retries it.
    pub async fn resume(&self, user_id: &str) -> Result<()> {
        let user_id = normalize_user(user_id)?;
        let state = if self.local.count().await == 0 {
            SyncState::Synced
        } else {
            SyncState::Error
        };
        tracing::debug!("Resumed session for {user_id} ({state})");
        let mut user = self.user.write().await;
        *self.state.write().await = state;
        *user = Some(user_id);
        Ok(())
    }

    /// Set the identity and migrate local logs into the remote store.
    ///
    /// Signing in again as the current user retries a failed migration.
    /// Switching accounts requires `sign_out` first.
    pub async fn sign_in(&self, user_id: &str) -> Result<SyncReport> {
        let user_id = normalize_user(user_id)?;
        {
            let mut user = self.user.write().await;
            let mut state = self.state.write().await;
            if let Some(current) = user.as_deref() {
                if current != user_id {
                    return Err(Error::InvalidInput(format!(
                        "already signed in as {current}; sign out first"
                    )));
                }
                match *state {
                    SyncState::Error => tracing::info!("Retrying log migration for {user_id}"),
                    SyncState::Syncing => {
                        tracing::debug!("Log migration for {user_id} already in progress");
                        return Ok(SyncReport::default());
                    }
                    SyncState::Offline | SyncState::Synced => return Ok(SyncReport::default()),
                }
            } else {
                tracing::info!("Signed in as {user_id}");
            }
            *user = Some(user_id.clone());
            *state = SyncState::Syncing;
        }

        let result = LogSynchronizer::new(&self.local, &self.remote)
            .migrate(&user_id)
            .await;
        *self.state.write().await = if result.is_ok() {
            SyncState::Synced
        } else {
            SyncState::Error
        };
        result
    }

    /// Clear the identity; later calls use local storage again
    pub async fn sign_out(&self) {
        if let Some(user_id) = self.user.write().await.take() {
            tracing::info!("Signed out {user_id}");
        }
        *self.state.write().await = SyncState::Offline;
    }

    /// Create an empty log at the end of the current user's list
    pub async fn create_log(&self, name: &str, visibility: bool) -> Result<LogId> {
        let name = normalize_text_option(Some(name.to_string()))
            .ok_or_else(|| Error::InvalidInput("log name cannot be empty".to_string()))?;

        match self.current_user().await {
            Some(user_id) => {
                let existing = self.remote.list_for_user(&user_id, true).await?;
                let priority = next_priority(&existing, &user_id);
                self.remote
                    .insert(
                        NewLog::new(name, user_id)
                            .visibility(visibility)
                            .priority(priority),
                    )
                    .await
            }
            None => {
                let existing = self.local.read_all().await;
                let log = Log::new_local(
                    name,
                    visibility,
                    next_priority(&existing, LOCAL_OWNER_ID),
                );
                let id = log.id.clone();
                self.local.append(log).await?;
                Ok(id)
            }
        }
    }

    /// Every log the current user sees, in their personal order
    pub async fn list_logs(&self) -> Result<Vec<Log>> {
        let (mut logs, user_id) = match self.current_user().await {
            Some(user_id) => (self.remote.list_for_user(&user_id, true).await?, user_id),
            None => (self.local.read_all().await, LOCAL_OWNER_ID.to_string()),
        };
        sort_for_user(&mut logs, &user_id);
        Ok(logs)
    }

    pub async fn get_log(&self, id: &LogId) -> Result<Log> {
        if self.current_user().await.is_some() {
            return self.remote.get(id).await;
        }
        self.local
            .find_by_id(id)
            .await
            .ok_or_else(|| not_found(id))
    }

    pub async fn update_log(&self, id: &LogId, patch: &LogPatch) -> Result<()> {
        if self.current_user().await.is_some() {
            return self.remote.update(id, patch).await;
        }
        self.local
            .update(id, patch)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    /// Delete a log; only its owner may delete a shared log
    pub async fn delete_log(&self, id: &LogId) -> Result<()> {
        if let Some(user_id) = self.current_user().await {
            let log = self.remote.get(id).await?;
            if !log.is_owned_by(&user_id) {
                return Err(Error::InvalidInput(format!(
                    "only the owner can delete log {id}"
                )));
            }
            return self.remote.delete(id).await;
        }
        if self.local.delete(id).await? {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    /// Move one log within the current user's list and persist the new ranks.
    ///
    /// Returns the list in its new order with updated priorities.
    pub async fn reorder_logs(&self, from: usize, to: usize) -> Result<Vec<Log>> {
        let current = self.list_logs().await?;
        let mut ordered = reorder(current, from, to)?;

        match self.current_user().await {
            Some(user_id) => {
                self.remote
                    .update_user_log_order(&user_id, &order_entries(&ordered, &user_id))
                    .await?;
                apply_positions(&mut ordered, &user_id);
            }
            None => {
                let ids: Vec<LogId> = ordered.iter().map(|log| log.id.clone()).collect();
                self.local.rewrite_priorities(&ids).await?;
                apply_positions(&mut ordered, LOCAL_OWNER_ID);
            }
        }
        Ok(ordered)
    }

    pub async fn add_movie(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        let movie_id = normalize_movie(movie_id)?;
        if self.current_user().await.is_some() {
            return self.remote.add_movie(id, &movie_id).await;
        }
        self.local
            .add_movie(id, &movie_id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn mark_watched(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        let movie_id = normalize_movie(movie_id)?;
        if self.current_user().await.is_some() {
            return self.remote.mark_watched(id, &movie_id).await;
        }
        self.local
            .mark_watched(id, &movie_id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn unmark_watched(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        let movie_id = normalize_movie(movie_id)?;
        if self.current_user().await.is_some() {
            return self.remote.unmark_watched(id, &movie_id).await;
        }
        self.local
            .unmark_watched(id, &movie_id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn add_collaborators(&self, id: &LogId, user_ids: &[String]) -> Result<()> {
        self.require_user("share a log").await?;
        self.remote.add_collaborators(id, user_ids).await
    }

    pub async fn remove_collaborators(&self, id: &LogId, user_ids: &[String]) -> Result<()> {
        self.require_user("unshare a log").await?;
        self.remote.remove_collaborators(id, user_ids).await
    }

    async fn require_user(&self, action: &str) -> Result<String> {
        self.current_user()
            .await
            .ok_or_else(|| Error::InvalidInput(format!("sign in to {action}")))
    }
}

fn normalize_user(user_id: &str) -> Result<String> {
    normalize_text_option(Some(user_id.to_string()))
        .ok_or_else(|| Error::InvalidInput("user id cannot be empty".to_string()))
}

/// Same rule on both storage paths, so a log keeps working after migration
fn normalize_movie(movie_id: &str) -> Result<String> {
    let movie_id = normalize_text_option(Some(movie_id.to_string()))
        .ok_or_else(|| Error::InvalidInput("movie id cannot be empty".to_string()))?;
    membership::validate_movie_id(&movie_id)?;
    Ok(movie_id)
}

fn not_found(id: &LogId) -> Error {
    Error::NotFound(format!("log {id}"))
}
