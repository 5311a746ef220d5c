use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reel_core::remote::MemoryDocumentStore;
use reel_core::{
    LocalLogStore, Log, LogId, LogService, MembershipOutcome, MovieState, RemoteLogStore,
    StoreConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

pub const SESSION_FILE_NAME: &str = "session.json";
pub const REMOTE_SNAPSHOT_FILE_NAME: &str = "remote.json";

/// The CLI keeps its "remote" store as a JSON snapshot next to local data
pub type Service = LogService<MemoryDocumentStore>;

/// Resolved storage locations for one invocation
#[derive(Debug, Clone)]
pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: StoreConfig,
}

impl AppContext {
    /// `--data-dir` wins over the config file and `REEL_DATA_DIR`
    pub fn resolve(cli_data_dir: Option<PathBuf>, config_path: Option<&Path>) -> Self {
        let config = config_path
            .map_or_else(StoreConfig::default, StoreConfig::load_from_path)
            .with_env_overrides();
        let data_dir = cli_data_dir.unwrap_or_else(|| config.resolve_data_dir(default_data_dir()));
        Self::with_config(data_dir, config)
    }

    pub fn with_config(data_dir: PathBuf, mut config: StoreConfig) -> Self {
        config.data_dir = Some(data_dir.clone());
        Self { data_dir, config }
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE_NAME)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(REMOTE_SNAPSHOT_FILE_NAME)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reel")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user_id: String,
}

pub async fn load_session(path: &Path) -> Result<Option<String>, CliError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let session: StoredSession = serde_json::from_slice(&bytes)?;
    Ok(Some(session.user_id))
}

pub async fn save_session(path: &Path, user_id: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_vec_pretty(&StoredSession {
        user_id: user_id.to_string(),
    })?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}

pub async fn clear_session(path: &Path) -> Result<(), CliError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// Build the service and restore the stored session, if any
pub async fn open_service(ctx: &AppContext) -> Result<Service, CliError> {
    let document_store = MemoryDocumentStore::open_snapshot(&ctx.snapshot_path()).await?;
    let service = LogService::new(
        LocalLogStore::from_config(&ctx.config, ctx.data_dir.clone()),
        RemoteLogStore::with_collection(document_store, ctx.config.remote_collection.clone()),
    );

    if let Some(user_id) = load_session(&ctx.session_path()).await? {
        service.resume(&user_id).await?;
    }
    Ok(service)
}

/// Write the remote snapshot back after a mutating command
pub async fn save_remote(service: &Service, ctx: &AppContext) -> Result<(), CliError> {
    service
        .remote()
        .document_store()
        .save_snapshot(&ctx.snapshot_path())
        .await?;
    Ok(())
}

pub fn normalize_words(words: &[String]) -> Option<String> {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_log_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyLogId);
    }
    Ok(trimmed.to_string())
}

/// Convert a 1-based list position to an index
pub fn position_to_index(position: usize) -> Result<usize, CliError> {
    match position.checked_sub(1) {
        Some(index) => Ok(index),
        None => Err(CliError::InvalidPosition(position)),
    }
}

/// Find a log by exact id, or by an id prefix unique within the user's list
pub async fn resolve_log(query: &str, service: &Service) -> Result<Log, CliError> {
    let query = normalize_log_identifier(query)?;
    match service.get_log(&LogId::from(query.as_str())).await {
        Ok(log) => return Ok(log),
        Err(error) if error.is_not_found() => {}
        Err(error) => return Err(error.into()),
    }

    let mut matching = service
        .list_logs()
        .await?
        .into_iter()
        .filter(|log| log.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::LogNotFound(query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|log| short_id(&log.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousLogId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogListItem {
    pub position: usize,
    pub id: String,
    pub name: String,
    pub visibility: &'static str,
    pub owner: String,
    pub to_watch: usize,
    pub watched: usize,
    pub last_modified: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct LogDetail {
    pub id: String,
    pub name: String,
    pub visibility: &'static str,
    pub owner: String,
    pub collaborators: Vec<String>,
    pub to_watch: Vec<String>,
    pub watched: Vec<String>,
    pub creation_date: String,
    pub last_modified_date: String,
}

pub fn log_to_list_item(position: usize, log: &Log) -> LogListItem {
    let now_ms = Utc::now().timestamp_millis();
    LogListItem {
        position,
        id: log.id.to_string(),
        name: log.name.clone(),
        visibility: visibility_label(log),
        owner: log.owner.user_id.clone(),
        to_watch: movies_in(log, MovieState::ToWatch).len(),
        watched: movies_in(log, MovieState::Watched).len(),
        last_modified: log.last_modified_date.clone(),
        relative_time: relative_time_of(&log.last_modified_date, now_ms),
    }
}

pub fn log_to_detail(log: &Log) -> LogDetail {
    LogDetail {
        id: log.id.to_string(),
        name: log.name.clone(),
        visibility: visibility_label(log),
        owner: log.owner.user_id.clone(),
        collaborators: log.collaborators.keys().cloned().collect(),
        to_watch: movies_in(log, MovieState::ToWatch),
        watched: movies_in(log, MovieState::Watched),
        creation_date: log.creation_date.clone(),
        last_modified_date: log.last_modified_date.clone(),
    }
}

pub fn format_log_lines(logs: &[Log]) -> Vec<String> {
    logs.iter()
        .enumerate()
        .map(|(index, log)| {
            let item = log_to_list_item(index + 1, log);
            let short = short_id(&log.id);
            let counts = format!("{} to watch, {} watched", item.to_watch, item.watched);
            format!(
                "{:>3}. {short:<13}  {:<30}  {:<7}  {counts:<24}  {}",
                item.position, item.name, item.visibility, item.relative_time
            )
        })
        .collect()
}

pub fn format_log_detail(log: &Log) -> Vec<String> {
    let detail = log_to_detail(log);
    let mut lines = vec![
        format!("{} ({})", detail.name, detail.visibility),
        format!("id:     {}", detail.id),
        format!("owner:  {}", detail.owner),
    ];
    if !detail.collaborators.is_empty() {
        lines.push(format!("shared: {}", detail.collaborators.join(", ")));
    }
    lines.push(format!("to watch ({}):", detail.to_watch.len()));
    lines.extend(detail.to_watch.iter().map(|movie| format!("  {movie}")));
    lines.push(format!("watched ({}):", detail.watched.len()));
    lines.extend(detail.watched.iter().map(|movie| format!("  {movie}")));
    lines
}

pub fn describe_outcome(outcome: MembershipOutcome, movie_id: &str, done: &str) -> String {
    match outcome {
        MembershipOutcome::Applied => format!("{movie_id} {done}"),
        MembershipOutcome::Unchanged => format!("{movie_id} unchanged"),
        MembershipOutcome::Rejected(reason) => format!("{movie_id} not changed: {reason}"),
    }
}

fn movies_in(log: &Log, state: MovieState) -> Vec<String> {
    let set = match state {
        MovieState::ToWatch => &log.movie_ids,
        MovieState::Watched => &log.watched_ids,
    };
    set.iter()
        .filter(|(_, present)| **present)
        .map(|(id, _)| id.clone())
        .collect()
}

const fn visibility_label(log: &Log) -> &'static str {
    if log.visibility {
        "public"
    } else {
        "private"
    }
}

pub fn short_id(id: &LogId) -> String {
    id.as_str().chars().take(13).collect()
}

/// Log timestamps are epoch millis, or RFC 3339 in older records
pub fn parse_timestamp_ms(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|parsed| parsed.timestamp_millis())
    })
}

fn relative_time_of(timestamp: &str, now_ms: i64) -> String {
    parse_timestamp_ms(timestamp).map_or_else(
        || "unknown".to_string(),
        |timestamp_ms| format_relative_time(timestamp_ms, now_ms),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
