use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] reel_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Log name cannot be empty")]
    EmptyName,
    #[error("Log ID cannot be empty")]
    EmptyLogId,
    #[error("Log not found for id/prefix: {0}")]
    LogNotFound(String),
    #[error("{0}")]
    AmbiguousLogId(String),
    #[error("List positions start at 1 (got {0})")]
    InvalidPosition(usize),
}
