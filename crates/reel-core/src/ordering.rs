//! Per-user log ordering.
//!
//! Each user ranks the logs they see independently: owners through
//! `owner.priority`, collaborators through `collaborators.<user>.priority`.

use crate::error::{Error, Result};
use crate::models::{Log, LogId};

/// One row of a user's persisted ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub log_id: LogId,
    /// Write to `owner.priority` rather than the collaborator record
    pub is_owner: bool,
}

/// Move the element at `from` so it ends up at `to`.
///
/// A single-element move, not a swap. `from == to` returns the list as-is.
pub fn reorder<T>(mut items: Vec<T>, from: usize, to: usize) -> Result<Vec<T>> {
    let len = items.len();
    if from >= len || to >= len {
        return Err(Error::InvalidInput(format!(
            "cannot move position {from} to {to} in a list of {len}"
        )));
    }

    let item = items.remove(from);
    items.insert(to, item);
    Ok(items)
}

/// Highest rank `user_id` has given any log; 0 for an empty list.
pub fn max_priority(logs: &[Log], user_id: &str) -> i64 {
    logs.iter()
        .filter_map(|log| log.priority_for(user_id))
        .max()
        .unwrap_or(0)
}

/// Rank for a log appended to the end of `user_id`'s list
pub fn next_priority(logs: &[Log], user_id: &str) -> i64 {
    max_priority(logs, user_id).saturating_add(1)
}

/// Sort ascending by `user_id`'s personal rank, keeping storage order for ties.
pub fn sort_for_user(logs: &mut [Log], user_id: &str) {
    logs.sort_by_key(|log| log.priority_for(user_id).unwrap_or(i64::MAX));
}

/// Ordering rows for persisting `ordered` as `user_id`'s list
pub fn order_entries(ordered: &[Log], user_id: &str) -> Vec<OrderEntry> {
    ordered
        .iter()
        .map(|log| OrderEntry {
            log_id: log.id.clone(),
            is_owner: log.is_owned_by(user_id),
        })
        .collect()
}

/// Set `user_id`'s rank on each log to its list position.
///
/// Writes the owner priority for owned logs and the collaborator record
/// otherwise; logs the user has no rank on are left alone.
pub fn apply_positions(logs: &mut [Log], user_id: &str) {
    for (index, log) in logs.iter_mut().enumerate() {
        let priority = position_priority(index);
        if log.is_owned_by(user_id) {
            log.owner.priority = priority;
        } else if let Some(collaborator) = log.collaborators.get_mut(user_id) {
            collaborator.priority = priority;
        }
    }
}

#[allow(clippy::cast_possible_wrap)] // list positions are far below i64::MAX
pub(crate) const fn position_priority(index: usize) -> i64 {
    index as i64
}
