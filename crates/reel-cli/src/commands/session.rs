use crate::commands::common::{
    clear_session, open_service, save_remote, save_session, AppContext,
};
use crate::error::CliError;

pub async fn run_login(user: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let result = service.sign_in(user).await;

    // The identity sticks even when migration fails, so `login` can retry it.
    if let Some(user_id) = service.current_user().await {
        save_session(&ctx.session_path(), &user_id).await?;
    }
    save_remote(&service, ctx).await?;

    let report = result?;
    let user_id = service.current_user().await.unwrap_or_default();
    if report.is_empty() {
        println!("Signed in as {user_id}");
    } else {
        println!(
            "Signed in as {user_id}; moved {} offline log(s) to your account",
            report.len()
        );
    }
    Ok(())
}

pub async fn run_logout(ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let previous = service.current_user().await;
    service.sign_out().await;
    clear_session(&ctx.session_path()).await?;
    match previous {
        Some(user_id) => println!("Signed out {user_id}"),
        None => println!("Not signed in"),
    }
    Ok(())
}

pub async fn run_whoami(ctx: &AppContext) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    match service.current_user().await {
        Some(user_id) => println!("{user_id} ({})", service.sync_state().await),
        None => println!("Not signed in ({})", service.sync_state().await),
    }
    Ok(())
}
