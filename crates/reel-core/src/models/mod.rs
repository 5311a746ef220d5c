//! Data models for Reel

mod log;
mod patch;

pub use log::{
    deserialize_priority, Collaborator, Log, LogId, MovieSet, Owner, LOCAL_OWNER_ID,
};
pub use patch::LogPatch;
pub(crate) use patch::{
    movie_set_value, FIELD_MOVIE_IDS, FIELD_VISIBILITY, FIELD_WATCHED_IDS,
};
