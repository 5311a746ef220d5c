use reel_core::LogPatch;

use crate::cli::Visibility;
use crate::commands::common::{
    format_log_detail, format_log_lines, log_to_detail, log_to_list_item, normalize_words,
    open_service, position_to_index, resolve_log, save_remote, AppContext, LogListItem,
};
use crate::error::CliError;

pub async fn run_new(name: &[String], public: bool, ctx: &AppContext) -> Result<(), CliError> {
    let name = normalize_words(name).ok_or(CliError::EmptyName)?;
    let service = open_service(ctx).await?;
    let id = service.create_log(&name, public).await?;
    save_remote(&service, ctx).await?;
    println!("{id}");
    Ok(())
}

pub async fn run_list(as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let logs = service.list_logs().await?;

    if as_json {
        let items = logs
            .iter()
            .enumerate()
            .map(|(index, log)| log_to_list_item(index + 1, log))
            .collect::<Vec<LogListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if logs.is_empty() {
        println!("No logs yet. Create one with `reel new <name>`.");
    } else {
        for line in format_log_lines(&logs) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_show(log: &str, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&log_to_detail(&log))?);
    } else {
        for line in format_log_detail(&log) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_rename(log: &str, name: &[String], ctx: &AppContext) -> Result<(), CliError> {
    let name = normalize_words(name).ok_or(CliError::EmptyName)?;
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    service
        .update_log(&log.id, &LogPatch::default().name(name))
        .await?;
    save_remote(&service, ctx).await?;
    println!("{}", log.id);
    Ok(())
}

pub async fn run_visibility(
    log: &str,
    visibility: Visibility,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    service
        .update_log(
            &log.id,
            &LogPatch::default().visibility(visibility.is_public()),
        )
        .await?;
    save_remote(&service, ctx).await?;
    println!("{}", log.id);
    Ok(())
}

pub async fn run_delete(log: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    service.delete_log(&log.id).await?;
    save_remote(&service, ctx).await?;
    println!("{}", log.id);
    Ok(())
}

pub async fn run_move(from: usize, to: usize, ctx: &AppContext) -> Result<(), CliError> {
    let from = position_to_index(from)?;
    let to = position_to_index(to)?;
    let service = open_service(ctx).await?;

    let ordered = service.reorder_logs(from, to).await?;
    save_remote(&service, ctx).await?;
    for line in format_log_lines(&ordered) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_share(log: &str, users: &[String], ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    service.add_collaborators(&log.id, users).await?;
    save_remote(&service, ctx).await?;
    println!("Shared '{}' with {}", log.name, users.join(", "));
    Ok(())
}

pub async fn run_unshare(log: &str, users: &[String], ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    service.remove_collaborators(&log.id, users).await?;
    save_remote(&service, ctx).await?;
    println!("Removed {} from '{}'", users.join(", "), log.name);
    Ok(())
}
