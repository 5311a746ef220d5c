//! Log model

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::util::timestamp_now;

/// Owner id recorded on logs created before any sign-in.
pub const LOCAL_OWNER_ID: &str = "local";

/// Movie identifiers mapped to a presence flag.
///
/// Stored as a map rather than a set so the remote store can add or remove a
/// single movie with one field-path write.
pub type MovieSet = BTreeMap<String, bool>;

/// An opaque log identifier.
///
/// Random UUIDs when created offline; whatever the remote store assigns
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

impl LogId {
    /// Generate a fresh random id for a locally created log
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LogId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LogId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The owning user and their personal rank for this log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub user_id: String,
    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: i64,
}

/// Per-collaborator record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: i64,
}

/// A named movie watchlist shared between an owner and collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Unique identifier within its storage
    pub id: LogId,
    /// Display name
    pub name: String,
    /// Public (`true`) or private
    #[serde(default, alias = "status")]
    pub visibility: bool,
    /// Creation timestamp (epoch-millis or ISO string)
    #[serde(default)]
    pub creation_date: String,
    /// Stamped on every mutation
    #[serde(default)]
    pub last_modified_date: String,
    pub owner: Owner,
    #[serde(default)]
    pub collaborators: BTreeMap<String, Collaborator>,
    /// Movies still to watch
    #[serde(default)]
    pub movie_ids: MovieSet,
    /// Movies already watched, disjoint from `movie_ids`
    #[serde(default)]
    pub watched_ids: MovieSet,
}

impl Log {
    /// Create a log for the offline (no identity) path
    #[must_use]
    pub fn new_local(name: impl Into<String>, visibility: bool, priority: i64) -> Self {
        let now = timestamp_now();
        Self {
            id: LogId::generate(),
            name: name.into(),
            visibility,
            creation_date: now.clone(),
            last_modified_date: now,
            owner: Owner {
                user_id: LOCAL_OWNER_ID.to_string(),
                priority,
            },
            collaborators: BTreeMap::new(),
            movie_ids: MovieSet::new(),
            watched_ids: MovieSet::new(),
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.user_id == user_id
    }

    /// The rank `user_id` gave this log in their own list.
    ///
    /// Owner priority when they own it, their collaborator priority otherwise,
    /// `None` when they are neither.
    #[must_use]
    pub fn priority_for(&self, user_id: &str) -> Option<i64> {
        if self.is_owned_by(user_id) {
            Some(self.owner.priority)
        } else {
            self.collaborators.get(user_id).map(|c| c.priority)
        }
    }

    #[must_use]
    pub fn is_pending(&self, movie_id: &str) -> bool {
        self.movie_ids.get(movie_id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_watched(&self, movie_id: &str) -> bool {
        self.watched_ids.get(movie_id).copied().unwrap_or(false)
    }

    /// Stamp `last_modified_date` with the current time
    pub fn touch(&mut self) {
        self.last_modified_date = timestamp_now();
    }
}

/// Decode a priority stored as an integer, a float, or nothing at all.
///
/// Documents written by different clients disagree on the numeric type, so
/// every priority is narrowed to `i64` here and nowhere else.
pub fn deserialize_priority<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(PriorityVisitor)
}

struct PriorityVisitor;

impl<'de> Visitor<'de> for PriorityVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an integer or floating-point priority")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<i64, E> {
        Ok(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<i64, E> {
        Ok(i64::try_from(value).unwrap_or(i64::MAX))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<i64, E> {
        Ok(priority_from_f64(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_none<E: de::Error>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(self)
    }
}

#[allow(clippy::cast_possible_truncation)] // float -> int casts saturate
fn priority_from_f64(value: f64) -> i64 {
    if value.is_finite() {
        value.trunc() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_json(priority: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "log-1",
            "name": "Weekend",
            "owner": { "userId": "u1", "priority": priority },
        })
    }

    #[test]
    fn test_log_id_unique() {
        assert_ne!(LogId::generate(), LogId::generate());
    }

    #[test]
    fn test_new_local_defaults() {
        let log = Log::new_local("My Log", false, 1);
        assert_eq!(log.name, "My Log");
        assert_eq!(log.owner.priority, 1);
        assert_eq!(log.owner.user_id, LOCAL_OWNER_ID);
        assert!(!log.visibility);
        assert!(log.movie_ids.is_empty());
        assert!(log.watched_ids.is_empty());
        assert_eq!(log.creation_date, log.last_modified_date);
    }

    #[test]
    fn test_priority_accepts_integer_and_float() {
        let int_log: Log = serde_json::from_value(log_json(json!(3))).unwrap();
        let float_log: Log = serde_json::from_value(log_json(json!(3.0))).unwrap();
        let fractional: Log = serde_json::from_value(log_json(json!(2.9))).unwrap();
        assert_eq!(int_log.owner.priority, 3);
        assert_eq!(float_log.owner.priority, 3);
        assert_eq!(fractional.owner.priority, 2);
    }

    #[test]
    fn test_priority_null_or_missing_is_zero() {
        let null_log: Log = serde_json::from_value(log_json(json!(null))).unwrap();
        assert_eq!(null_log.owner.priority, 0);

        let missing: Log = serde_json::from_value(json!({
            "id": "log-2",
            "name": "No rank",
            "owner": { "userId": "u1" },
            "collaborators": { "u2": {} },
        }))
        .unwrap();
        assert_eq!(missing.owner.priority, 0);
        assert_eq!(missing.priority_for("u2"), Some(0));
    }

    #[test]
    fn test_priority_rejects_strings() {
        let result: Result<Log, _> = serde_json::from_value(log_json(json!("high")));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_alias_for_visibility() {
        let log: Log = serde_json::from_value(json!({
            "id": "log-3",
            "name": "Legacy",
            "status": true,
            "owner": { "userId": "u1", "priority": 0 },
        }))
        .unwrap();
        assert!(log.visibility);
    }

    #[test]
    fn test_priority_for_owner_and_collaborator() {
        let mut log = Log::new_local("Shared", true, 2);
        log.owner.user_id = "owner".into();
        log.collaborators
            .insert("friend".into(), Collaborator { priority: 7 });

        assert_eq!(log.priority_for("owner"), Some(2));
        assert_eq!(log.priority_for("friend"), Some(7));
        assert_eq!(log.priority_for("stranger"), None);
    }

    #[test]
    fn test_movie_flags_require_true() {
        let mut log = Log::new_local("Flags", false, 0);
        log.movie_ids.insert("1".into(), true);
        log.movie_ids.insert("2".into(), false);
        assert!(log.is_pending("1"));
        assert!(!log.is_pending("2"));
        assert!(!log.is_watched("1"));
    }

    #[test]
    fn test_serialized_field_names() {
        let log = Log::new_local("Names", false, 0);
        let value = serde_json::to_value(&log).unwrap();
        for key in ["creationDate", "lastModifiedDate", "movieIds", "watchedIds"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["owner"].get("userId").is_some());
    }
}
