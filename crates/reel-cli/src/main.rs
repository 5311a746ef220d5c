//! Reel CLI - shared movie watchlists from the command line
//!
//! Logs live on this device until you sign in, then move to your account.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::AppContext;
use crate::commands::logs::{
    run_delete, run_list, run_move, run_new, run_rename, run_share, run_show, run_unshare,
    run_visibility,
};
use crate::commands::movies::{run_add_movie, run_unwatched, run_watched};
use crate::commands::session::{run_login, run_logout, run_whoami};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "reel=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::resolve(cli.data_dir, cli.config.as_deref());

    match cli.command {
        Commands::New { name, public } => run_new(&name, public, &ctx).await?,
        Commands::List { json } => run_list(json, &ctx).await?,
        Commands::Show { log, json } => run_show(&log, json, &ctx).await?,
        Commands::Rename { log, name } => run_rename(&log, &name, &ctx).await?,
        Commands::Visibility { log, visibility } => {
            run_visibility(&log, visibility, &ctx).await?;
        }
        Commands::Delete { log } => run_delete(&log, &ctx).await?,
        Commands::Move { from, to } => run_move(from, to, &ctx).await?,
        Commands::AddMovie { log, movie } => run_add_movie(&log, &movie, &ctx).await?,
        Commands::Watched { log, movie } => run_watched(&log, &movie, &ctx).await?,
        Commands::Unwatched { log, movie } => run_unwatched(&log, &movie, &ctx).await?,
        Commands::Share { log, users } => run_share(&log, &users, &ctx).await?,
        Commands::Unshare { log, users } => run_unshare(&log, &users, &ctx).await?,
        Commands::Login { user } => run_login(&user, &ctx).await?,
        Commands::Logout => run_logout(&ctx).await?,
        Commands::Whoami => run_whoami(&ctx).await?,
    }

    Ok(())
}
