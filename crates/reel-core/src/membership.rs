//! Movie membership rules for a log's "to watch" and "watched" sets.
//!
//! A movie id is in at most one of the two sets. Violated preconditions are
//! logged and ignored rather than reported as errors.

use crate::error::{Error, Result};
use crate::models::{Log, MovieSet, FIELD_MOVIE_IDS, FIELD_WATCHED_IDS};

/// Which set a movie id lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieState {
    ToWatch,
    Watched,
}

impl MovieState {
    /// Document field holding this set
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::ToWatch => FIELD_MOVIE_IDS,
            Self::Watched => FIELD_WATCHED_IDS,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::ToWatch => Self::Watched,
            Self::Watched => Self::ToWatch,
        }
    }

    fn contains(self, log: &Log, movie_id: &str) -> bool {
        match self {
            Self::ToWatch => log.is_pending(movie_id),
            Self::Watched => log.is_watched(movie_id),
        }
    }

    fn set_mut(self, log: &mut Log) -> &mut MovieSet {
        match self {
            Self::ToWatch => &mut log.movie_ids,
            Self::Watched => &mut log.watched_ids,
        }
    }
}

/// Result of a membership mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// The log changed
    Applied,
    /// The movie was already where it was asked to be
    Unchanged,
    /// A precondition failed; the log is untouched
    Rejected(&'static str),
}

impl MembershipOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Whether `movie_id` can be stored in either set.
///
/// Remote writes address a movie as `movieIds.<id>`, so ids cannot be blank
/// or contain dots on any storage path.
#[must_use]
pub fn is_valid_movie_id(movie_id: &str) -> bool {
    !movie_id.trim().is_empty() && !movie_id.contains('.')
}

pub fn validate_movie_id(movie_id: &str) -> Result<()> {
    if is_valid_movie_id(movie_id) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid movie id: '{movie_id}'")))
    }
}

/// Check whether `movie_id` can be added to the to-watch set.
pub fn check_add(log: &Log, movie_id: &str) -> MembershipOutcome {
    if log.is_watched(movie_id) {
        MembershipOutcome::Rejected("movie is already watched")
    } else if log.is_pending(movie_id) {
        MembershipOutcome::Unchanged
    } else {
        MembershipOutcome::Applied
    }
}

/// Check whether `movie_id` can move into `target`.
pub fn check_move(log: &Log, movie_id: &str, target: MovieState) -> MembershipOutcome {
    let source = target.opposite();
    if !source.contains(log, movie_id) {
        MembershipOutcome::Rejected(match source {
            MovieState::ToWatch => "movie is not in movieIds",
            MovieState::Watched => "movie is not in watchedIds",
        })
    } else if target.contains(log, movie_id) {
        MembershipOutcome::Rejected(match target {
            MovieState::ToWatch => "movie is already in movieIds",
            MovieState::Watched => "movie is already in watchedIds",
        })
    } else {
        MembershipOutcome::Applied
    }
}

/// Insert `movie_id` into the to-watch set.
pub fn add_movie(log: &mut Log, movie_id: &str) -> MembershipOutcome {
    let outcome = check_add(log, movie_id);
    match outcome {
        MembershipOutcome::Applied => {
            log.movie_ids.insert(movie_id.to_string(), true);
            log.touch();
        }
        MembershipOutcome::Rejected(reason) => report_rejection(log, movie_id, reason),
        MembershipOutcome::Unchanged => {}
    }
    outcome
}

/// Move `movie_id` from the to-watch set into the watched set.
pub fn mark_watched(log: &mut Log, movie_id: &str) -> MembershipOutcome {
    move_movie(log, movie_id, MovieState::Watched)
}

/// Move `movie_id` from the watched set back into the to-watch set.
pub fn unmark_watched(log: &mut Log, movie_id: &str) -> MembershipOutcome {
    move_movie(log, movie_id, MovieState::ToWatch)
}

fn move_movie(log: &mut Log, movie_id: &str, target: MovieState) -> MembershipOutcome {
    let outcome = check_move(log, movie_id, target);
    match outcome {
        MembershipOutcome::Applied => {
            target.opposite().set_mut(log).remove(movie_id);
            target.set_mut(log).insert(movie_id.to_string(), true);
            log.touch();
        }
        MembershipOutcome::Rejected(reason) => report_rejection(log, movie_id, reason),
        MembershipOutcome::Unchanged => {}
    }
    outcome
}

pub(crate) fn report_rejection(log: &Log, movie_id: &str, reason: &str) {
    tracing::warn!(
        log_id = %log.id,
        movie_id,
        "Ignoring movie membership change: {reason}"
    );
}
