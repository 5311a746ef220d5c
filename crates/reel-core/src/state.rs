//! Connection state reported to clients.

use std::fmt;

/// Where the log service stands with the remote store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Signed out; logs live in local storage
    #[default]
    Offline,
    /// Local logs are being migrated after sign-in
    Syncing,
    /// Signed in with nothing left to migrate
    Synced,
    /// The last migration failed; local logs are still on disk
    Error,
}

impl SyncState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
