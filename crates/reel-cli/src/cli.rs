use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "Keep shared movie watchlists from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding local logs, the session and the remote snapshot
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Optional store config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new log at the end of your list
    New {
        /// Log name
        #[arg(required = true)]
        name: Vec<String>,
        /// Make the log public
        #[arg(long)]
        public: bool,
    },
    /// List your logs in your own order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one log with its movies
    Show {
        /// Log ID or unique ID prefix
        log: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a log
    Rename {
        /// Log ID or unique ID prefix
        log: String,
        /// New name
        #[arg(required = true)]
        name: Vec<String>,
    },
    /// Make a log public or private
    Visibility {
        /// Log ID or unique ID prefix
        log: String,
        #[arg(value_enum)]
        visibility: Visibility,
    },
    /// Delete a log
    Delete {
        /// Log ID or unique ID prefix
        log: String,
    },
    /// Move a log from one list position to another (1-based)
    Move { from: usize, to: usize },
    /// Add a movie to a log's to-watch list
    AddMovie {
        /// Log ID or unique ID prefix
        log: String,
        /// Movie ID
        movie: String,
    },
    /// Mark a to-watch movie as watched
    Watched {
        /// Log ID or unique ID prefix
        log: String,
        /// Movie ID
        movie: String,
    },
    /// Move a watched movie back to to-watch
    Unwatched {
        /// Log ID or unique ID prefix
        log: String,
        /// Movie ID
        movie: String,
    },
    /// Add collaborators to a log
    Share {
        /// Log ID or unique ID prefix
        log: String,
        /// User IDs to add
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Remove collaborators from a log
    Unshare {
        /// Log ID or unique ID prefix
        log: String,
        /// User IDs to remove
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Sign in and move offline logs to your account
    Login {
        /// User ID
        user: String,
    },
    /// Sign out; new logs are kept on this device
    Logout,
    /// Show the signed-in user and sync state
    Whoami,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}
