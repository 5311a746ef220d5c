use crate::commands::common::{describe_outcome, open_service, resolve_log, save_remote, AppContext};
use crate::error::CliError;

pub async fn run_add_movie(log: &str, movie: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    let outcome = service.add_movie(&log.id, movie).await?;
    save_remote(&service, ctx).await?;
    println!("{}", describe_outcome(outcome, movie.trim(), "added"));
    Ok(())
}

pub async fn run_watched(log: &str, movie: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    let outcome = service.mark_watched(&log.id, movie).await?;
    save_remote(&service, ctx).await?;
    println!("{}", describe_outcome(outcome, movie.trim(), "marked watched"));
    Ok(())
}

pub async fn run_unwatched(log: &str, movie: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let log = resolve_log(log, &service).await?;

    let outcome = service.unmark_watched(&log.id, movie).await?;
    save_remote(&service, ctx).await?;
    println!("{}", describe_outcome(outcome, movie.trim(), "back on the to-watch list"));
    Ok(())
}
