//! reel-core - Core library for Reel
//!
//! This crate contains the log model, the offline and remote log stores, the
//! sign-in migration and the service facade used by every Reel interface.

pub mod config;
pub mod error;
pub mod local;
pub mod membership;
pub mod models;
pub mod ordering;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use local::LocalLogStore;
pub use membership::{MembershipOutcome, MovieState};
pub use models::{Log, LogId, LogPatch};
pub use remote::{DocumentStore, MemoryDocumentStore, RemoteLogStore};
pub use services::LogService;
pub use state::SyncState;
pub use sync::{LogSynchronizer, SyncReport};
