//! Whitelisted partial updates for logs

use serde_json::{Map, Value};

use super::log::{Log, MovieSet};
use crate::error::{Error, Result};

/// Field names a partial update is allowed to touch.
pub const FIELD_NAME: &str = "name";
pub const FIELD_VISIBILITY: &str = "visibility";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_MOVIE_IDS: &str = "movieIds";
pub const FIELD_WATCHED_IDS: &str = "watchedIds";

/// A partial update restricted to the user-editable log fields.
///
/// Ownership, collaborators, priorities and timestamps are never part of a
/// patch; they have dedicated operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPatch {
    pub name: Option<String>,
    pub visibility: Option<bool>,
    pub movie_ids: Option<MovieSet>,
    pub watched_ids: Option<MovieSet>,
}

impl LogPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn visibility(mut self, visibility: bool) -> Self {
        self.visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn movie_ids(mut self, movie_ids: MovieSet) -> Self {
        self.movie_ids = Some(movie_ids);
        self
    }

    #[must_use]
    pub fn watched_ids(mut self, watched_ids: MovieSet) -> Self {
        self.watched_ids = Some(watched_ids);
        self
    }

    /// Every whitelisted field of `log`, as written by batch updates.
    #[must_use]
    pub fn from_log(log: &Log) -> Self {
        Self {
            name: Some(log.name.clone()),
            visibility: Some(log.visibility),
            movie_ids: Some(log.movie_ids.clone()),
            watched_ids: Some(log.watched_ids.clone()),
        }
    }

    /// Build a patch from loosely-typed fields.
    ///
    /// Unrecognized keys are dropped. A recognized key holding the wrong type
    /// is rejected with `InvalidInput`.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut patch = Self::default();

        for (key, value) in fields {
            match key.as_str() {
                FIELD_NAME => {
                    let name = value.as_str().ok_or_else(|| invalid_field(key))?;
                    patch.name = Some(name.to_string());
                }
                FIELD_VISIBILITY | FIELD_STATUS => {
                    patch.visibility = Some(value.as_bool().ok_or_else(|| invalid_field(key))?);
                }
                FIELD_MOVIE_IDS => {
                    patch.movie_ids = Some(
                        serde_json::from_value(value.clone()).map_err(|_| invalid_field(key))?,
                    );
                }
                FIELD_WATCHED_IDS => {
                    patch.watched_ids = Some(
                        serde_json::from_value(value.clone()).map_err(|_| invalid_field(key))?,
                    );
                }
                other => tracing::debug!("Ignoring non-updatable log field '{other}'"),
            }
        }

        Ok(patch)
    }

    /// True when no recognized field is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.visibility.is_none()
            && self.movie_ids.is_none()
            && self.watched_ids.is_none()
    }

    /// Apply to an in-memory log, stamping `last_modified_date`.
    ///
    /// Returns `false` (and leaves the log untouched) for an empty patch.
    pub fn apply_to(&self, log: &mut Log) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(name) = &self.name {
            log.name.clone_from(name);
        }
        if let Some(visibility) = self.visibility {
            log.visibility = visibility;
        }
        if let Some(movie_ids) = &self.movie_ids {
            log.movie_ids.clone_from(movie_ids);
        }
        if let Some(watched_ids) = &self.watched_ids {
            log.watched_ids.clone_from(watched_ids);
        }
        log.touch();
        true
    }

    /// Top-level document fields this patch writes.
    pub(crate) fn document_fields(&self) -> Vec<(String, Value)> {
        let mut fields = Vec::new();
        if let Some(name) = &self.name {
            fields.push((FIELD_NAME.to_string(), Value::String(name.clone())));
        }
        if let Some(visibility) = self.visibility {
            fields.push((FIELD_VISIBILITY.to_string(), Value::Bool(visibility)));
        }
        if let Some(movie_ids) = &self.movie_ids {
            fields.push((FIELD_MOVIE_IDS.to_string(), movie_set_value(movie_ids)));
        }
        if let Some(watched_ids) = &self.watched_ids {
            fields.push((FIELD_WATCHED_IDS.to_string(), movie_set_value(watched_ids)));
        }
        fields
    }
}

pub(crate) fn movie_set_value(ids: &MovieSet) -> Value {
    Value::Object(
        ids.iter()
            .map(|(id, present)| (id.clone(), Value::Bool(*present)))
            .collect(),
    )
}

fn invalid_field(key: &str) -> Error {
    Error::InvalidInput(format!("log field '{key}' has an unexpected type"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn from_fields_keeps_only_whitelisted_keys() {
        let patch = LogPatch::from_fields(&fields(json!({
            "name": "Renamed",
            "owner": { "userId": "attacker" },
            "collaborators": {},
            "creationDate": "0",
        })))
        .unwrap();

        assert_eq!(patch, LogPatch::default().name("Renamed"));
    }

    #[test]
    fn from_fields_accepts_status_alias() {
        let patch = LogPatch::from_fields(&fields(json!({ "status": true }))).unwrap();
        assert_eq!(patch.visibility, Some(true));
    }

    #[test]
    fn from_fields_reads_movie_sets() {
        let patch = LogPatch::from_fields(&fields(json!({
            "movieIds": { "531330": true },
            "watchedIds": {},
        })))
        .unwrap();
        assert_eq!(
            patch.movie_ids,
            Some(MovieSet::from([("531330".to_string(), true)]))
        );
        assert_eq!(patch.watched_ids, Some(MovieSet::new()));
    }

    #[test]
    fn from_fields_rejects_wrong_types() {
        let error = LogPatch::from_fields(&fields(json!({ "visibility": "yes" }))).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn unrecognized_only_is_empty() {
        let patch = LogPatch::from_fields(&fields(json!({ "id": "x" }))).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_to_stamps_modified_date() {
        let mut log = Log::new_local("Before", false, 0);
        log.last_modified_date = "0".into();

        assert!(LogPatch::default()
            .name("After")
            .visibility(true)
            .apply_to(&mut log));
        assert_eq!(log.name, "After");
        assert!(log.visibility);
        assert_ne!(log.last_modified_date, "0");
    }

    #[test]
    fn empty_patch_does_not_touch() {
        let mut log = Log::new_local("Same", false, 0);
        log.last_modified_date = "0".into();
        assert!(!LogPatch::default().apply_to(&mut log));
        assert_eq!(log.last_modified_date, "0");
    }
}
