//! Log CRUD and queries over a shared document collection.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::document::{Document, DocumentStore, FieldUpdate, Filter, WriteBatch};
use crate::config::DEFAULT_REMOTE_COLLECTION;
use crate::error::{Error, Result};
use crate::membership::{self, MembershipOutcome, MovieState};
use crate::models::{
    movie_set_value, Log, LogId, LogPatch, MovieSet, FIELD_VISIBILITY,
};
use crate::ordering::{position_priority, OrderEntry};
use crate::util::timestamp_now;

const FIELD_LAST_MODIFIED: &str = "lastModifiedDate";
const FIELD_OWNER_ID: &str = "owner.userId";
const FIELD_OWNER_PRIORITY: &str = "owner.priority";

/// Fields for a log about to be inserted remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLog {
    pub name: String,
    pub owner_id: String,
    pub visibility: bool,
    pub priority: i64,
    /// Defaults to the insertion time
    pub creation_date: Option<String>,
    pub movie_ids: MovieSet,
    pub watched_ids: MovieSet,
}

impl NewLog {
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            visibility: false,
            priority: 0,
            creation_date: None,
            movie_ids: MovieSet::new(),
            watched_ids: MovieSet::new(),
        }
    }

    #[must_use]
    pub const fn visibility(mut self, visibility: bool) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub const fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    fn into_document(self) -> Document {
        let now = timestamp_now();
        let document = json!({
            "name": self.name,
            "visibility": self.visibility,
            "creationDate": self.creation_date.unwrap_or_else(|| now.clone()),
            "lastModifiedDate": now,
            "owner": { "userId": self.owner_id, "priority": self.priority },
            "collaborators": {},
            "movieIds": movie_set_value(&self.movie_ids),
            "watchedIds": movie_set_value(&self.watched_ids),
        });
        match document {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}

/// Remote log repository over any `DocumentStore`
pub struct RemoteLogStore<D> {
    store: D,
    collection: String,
}

impl<D: DocumentStore> RemoteLogStore<D> {
    pub fn new(store: D) -> Self {
        Self::with_collection(store, DEFAULT_REMOTE_COLLECTION)
    }

    pub fn with_collection(store: D, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// The underlying document store
    pub const fn document_store(&self) -> &D {
        &self.store
    }

    /// Create an empty log ranked first in the owner's list
    pub async fn create(&self, name: &str, owner_id: &str, visibility: bool) -> Result<LogId> {
        self.insert(NewLog::new(name, owner_id).visibility(visibility))
            .await
    }

    /// Create a log migrated from local storage.
    ///
    /// Keeps the original rank, creation date and movie sets. Migrated logs are
    /// always private. Movie ids that cannot be addressed as a field path are
    /// dropped with a warning.
    pub async fn create_synced(
        &self,
        name: &str,
        owner_id: &str,
        priority: i64,
        creation_date: &str,
        movie_ids: &MovieSet,
        watched_ids: &MovieSet,
    ) -> Result<LogId> {
        self.insert(NewLog {
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            visibility: false,
            priority,
            creation_date: Some(creation_date.to_string()),
            movie_ids: addressable_movies(name, movie_ids),
            watched_ids: addressable_movies(name, watched_ids),
        })
        .await
    }

    /// Insert a fully specified log
    pub async fn insert(&self, new_log: NewLog) -> Result<LogId> {
        validate_path_segment(&new_log.owner_id, "owner id")?;
        let id = self
            .store
            .add(&self.collection, new_log.into_document())
            .await
            .map_err(Error::into_write_failure)?;
        tracing::debug!("Created remote log {id}");
        Ok(LogId::from(id))
    }

    pub async fn get(&self, id: &LogId) -> Result<Log> {
        let document = self
            .store
            .get(&self.collection, id.as_str())
            .await
            .map_err(Error::into_read_failure)?
            .ok_or_else(|| Error::NotFound(format!("log {id}")))?;
        log_from_document(id.as_str(), document)
    }

    /// Logs `user_id` owns plus logs they collaborate on.
    ///
    /// Both queries run concurrently. A log matching both is returned once,
    /// from the owner query.
    pub async fn list_for_user(&self, user_id: &str, include_private: bool) -> Result<Vec<Log>> {
        validate_path_segment(user_id, "user id")?;

        let mut owner_filters = vec![Filter::Equals(
            FIELD_OWNER_ID.to_string(),
            Value::from(user_id),
        )];
        let mut collaborator_filters = vec![Filter::Exists(collaborator_path(user_id))];
        if !include_private {
            let public = Filter::Equals(FIELD_VISIBILITY.to_string(), Value::Bool(true));
            owner_filters.push(public.clone());
            collaborator_filters.push(public);
        }

        let (owned, shared) = tokio::join!(
            self.store.query(&self.collection, &owner_filters),
            self.store.query(&self.collection, &collaborator_filters),
        );
        let owned = owned.map_err(Error::into_read_failure)?;
        let shared = shared.map_err(Error::into_read_failure)?;

        let mut seen = HashSet::new();
        let mut logs = Vec::with_capacity(owned.len() + shared.len());
        for (id, document) in owned.into_iter().chain(shared) {
            if !seen.insert(id.clone()) {
                tracing::debug!("Skipping duplicate log {id} for user {user_id}");
                continue;
            }
            match log_from_document(&id, document) {
                Ok(log) => logs.push(log),
                Err(error) => tracing::warn!("Skipping malformed log document {id}: {error}"),
            }
        }
        Ok(logs)
    }

    /// Apply a whitelisted partial update, stamping `lastModifiedDate`.
    ///
    /// An empty patch writes nothing.
    pub async fn update(&self, id: &LogId, patch: &LogPatch) -> Result<()> {
        let Some(fields) = patch_fields(patch) else {
            tracing::debug!("No updatable fields for log {id}; skipping write");
            return Ok(());
        };
        self.store
            .update(&self.collection, id.as_str(), fields)
            .await
            .map_err(Error::into_write_failure)
    }

    /// `update` from loosely-typed fields; unknown keys are ignored
    pub async fn update_fields(&self, id: &LogId, fields: &Document) -> Result<()> {
        let patch = LogPatch::from_fields(fields)?;
        self.update(id, &patch).await
    }

    /// Write the whitelisted fields of every log in one atomic batch
    pub async fn update_batch(&self, logs: &[Log]) -> Result<()> {
        let mut batch = WriteBatch::new();
        for log in logs {
            if let Some(fields) = patch_fields(&LogPatch::from_log(log)) {
                batch.update(log.id.as_str(), fields);
            }
        }
        self.commit(batch).await
    }

    pub async fn delete(&self, id: &LogId) -> Result<()> {
        self.store
            .delete(&self.collection, id.as_str())
            .await
            .map_err(Error::into_write_failure)?;
        tracing::debug!("Deleted remote log {id}");
        Ok(())
    }

    /// Persist `user_id`'s ordering: each entry's index becomes its priority.
    ///
    /// Owned logs take the index in `owner.priority`, shared ones in
    /// `collaborators.<user_id>.priority`. A shared log that no longer lists
    /// the user is skipped, so a stale order cannot restore removed access.
    /// One atomic batch.
    pub async fn update_user_log_order(&self, user_id: &str, order: &[OrderEntry]) -> Result<()> {
        validate_path_segment(user_id, "user id")?;
        let mut batch = WriteBatch::new();
        for (index, entry) in order.iter().enumerate() {
            let path = if entry.is_owner {
                FIELD_OWNER_PRIORITY.to_string()
            } else {
                let log = self.get(&entry.log_id).await?;
                if !log.collaborators.contains_key(user_id) {
                    tracing::warn!(
                        "User {user_id} no longer collaborates on log {}; skipping its rank",
                        entry.log_id
                    );
                    continue;
                }
                format!("{}.priority", collaborator_path(user_id))
            };
            batch.update(
                entry.log_id.as_str(),
                vec![(path, FieldUpdate::Set(Value::from(position_priority(index))))],
            );
        }
        self.commit(batch).await
    }

    /// Add collaborator records, one sub-field per user, in one update.
    ///
    /// Users already collaborating keep their rank. The owner cannot be added.
    pub async fn add_collaborators(&self, id: &LogId, user_ids: &[String]) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        for user_id in user_ids {
            validate_path_segment(user_id, "user id")?;
        }
        let log = self.get(id).await?;
        if let Some(owner) = user_ids.iter().find(|user_id| log.is_owned_by(user_id)) {
            return Err(Error::InvalidInput(format!(
                "{owner} owns log {id} and cannot be a collaborator"
            )));
        }

        let mut added = HashSet::new();
        let new_users: Vec<String> = user_ids
            .iter()
            .filter(|user_id| !log.collaborators.contains_key(user_id.as_str()))
            .filter(|user_id| added.insert(user_id.as_str()))
            .cloned()
            .collect();
        if new_users.is_empty() {
            tracing::debug!("Every user already collaborates on log {id}; skipping write");
            return Ok(());
        }
        self.write_collaborators(id, &new_users, &FieldUpdate::Set(json!({ "priority": 0 })))
            .await
    }

    /// Remove collaborator records with delete markers, in one update
    pub async fn remove_collaborators(&self, id: &LogId, user_ids: &[String]) -> Result<()> {
        self.write_collaborators(id, user_ids, &FieldUpdate::Delete)
            .await
    }

    /// Add a movie to the to-watch set with a single field write.
    ///
    /// The log is read first to keep watched movies out of the to-watch set.
    pub async fn add_movie(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        membership::validate_movie_id(movie_id)?;
        let log = self.get(id).await?;
        let outcome = membership::check_add(&log, movie_id);
        match outcome {
            MembershipOutcome::Applied => {
                self.write_movie_fields(
                    id,
                    vec![(
                        movie_path(MovieState::ToWatch, movie_id),
                        FieldUpdate::Set(Value::Bool(true)),
                    )],
                )
                .await?;
            }
            MembershipOutcome::Rejected(reason) => {
                membership::report_rejection(&log, movie_id, reason);
            }
            MembershipOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Move a movie from to-watch into watched.
    ///
    /// Reads the log to check preconditions, then writes the move as one
    /// field-level update. Another writer can change the log between the read
    /// and the write; no version check guards that window.
    pub async fn mark_watched(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        self.move_movie(id, movie_id, MovieState::Watched).await
    }

    /// Move a movie from watched back into to-watch. Same race as `mark_watched`.
    pub async fn unmark_watched(&self, id: &LogId, movie_id: &str) -> Result<MembershipOutcome> {
        self.move_movie(id, movie_id, MovieState::ToWatch).await
    }

    async fn move_movie(
        &self,
        id: &LogId,
        movie_id: &str,
        target: MovieState,
    ) -> Result<MembershipOutcome> {
        membership::validate_movie_id(movie_id)?;
        let log = self.get(id).await?;
        let outcome = membership::check_move(&log, movie_id, target);
        match outcome {
            MembershipOutcome::Applied => {
                self.write_movie_fields(
                    id,
                    vec![
                        (movie_path(target.opposite(), movie_id), FieldUpdate::Delete),
                        (
                            movie_path(target, movie_id),
                            FieldUpdate::Set(Value::Bool(true)),
                        ),
                    ],
                )
                .await?;
            }
            MembershipOutcome::Rejected(reason) => {
                membership::report_rejection(&log, movie_id, reason);
            }
            MembershipOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    async fn write_movie_fields(
        &self,
        id: &LogId,
        mut fields: Vec<(String, FieldUpdate)>,
    ) -> Result<()> {
        fields.push(last_modified_now());
        self.store
            .update(&self.collection, id.as_str(), fields)
            .await
            .map_err(Error::into_write_failure)
    }

    async fn write_collaborators(
        &self,
        id: &LogId,
        user_ids: &[String],
        update: &FieldUpdate,
    ) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let mut fields = Vec::with_capacity(user_ids.len() + 1);
        for user_id in user_ids {
            validate_path_segment(user_id, "user id")?;
            fields.push((collaborator_path(user_id), update.clone()));
        }
        fields.push(last_modified_now());

        self.store
            .update(&self.collection, id.as_str(), fields)
            .await
            .map_err(Error::into_write_failure)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        self.store
            .commit(&self.collection, batch)
            .await
            .map_err(Error::into_write_failure)?;
        tracing::debug!("Committed batch of {ops} log write(s)");
        Ok(())
    }
}

fn patch_fields(patch: &LogPatch) -> Option<Vec<(String, FieldUpdate)>> {
    if patch.is_empty() {
        return None;
    }
    let mut fields: Vec<(String, FieldUpdate)> = patch
        .document_fields()
        .into_iter()
        .map(|(key, value)| (key, FieldUpdate::Set(value)))
        .collect();
    fields.push(last_modified_now());
    Some(fields)
}

fn last_modified_now() -> (String, FieldUpdate) {
    (
        FIELD_LAST_MODIFIED.to_string(),
        FieldUpdate::Set(Value::String(timestamp_now())),
    )
}

fn collaborator_path(user_id: &str) -> String {
    format!("collaborators.{user_id}")
}

fn addressable_movies(log_name: &str, movies: &MovieSet) -> MovieSet {
    movies
        .iter()
        .filter(|(movie_id, _)| {
            let valid = membership::is_valid_movie_id(movie_id);
            if !valid {
                tracing::warn!("Dropping invalid movie id '{movie_id}' from log {log_name}");
            }
            valid
        })
        .map(|(movie_id, present)| (movie_id.clone(), *present))
        .collect()
}

fn movie_path(state: MovieState, movie_id: &str) -> String {
    format!("{}.{movie_id}", state.field())
}

/// Ids are spliced into dotted field paths, so they cannot contain dots.
fn validate_path_segment(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains('.') {
        return Err(Error::InvalidInput(format!("invalid {what}: '{value}'")));
    }
    Ok(())
}

fn log_from_document(id: &str, mut document: Document) -> Result<Log> {
    document.insert("id".to_string(), Value::String(id.to_string()));
    Ok(serde_json::from_value(Value::Object(document))?)
}
