use crate::app::{load_config, load_credentials, App};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use movie_sync_client::ApiError;
use movie_sync_config::PathManager;

/// Stores a bearer token after checking it against the backend.
///
/// Tokens are issued by the web sign-in flow; this only verifies and keeps one.
pub async fn run_login(token_arg: Option<String>, output: &Output) -> Result<()> {
    let token = match token_arg {
        Some(token) => token,
        None => rpassword::prompt_password("Access token: ")
            .map_err(|e| eyre!("Failed to read token: {}", e))?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(eyre!("Access token cannot be empty"));
    }

    let paths = PathManager::default();
    let config = load_config(&paths)?;
    let app = App::build(config, paths, Some(token.clone()))?;

    let profile = match app.coordinator.initialize().await {
        Ok(profile) => profile,
        Err(ApiError::Auth) => return Err(eyre!("The server rejected this token")),
        Err(e) => return Err(eyre!("Could not verify token: {}", e.user_message())),
    };

    let mut credentials = load_credentials(&app.paths)?;
    credentials.clear_session();
    credentials.set_access_token(token);
    credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    tracing::info!(operation = "login", user = %profile.username, "Signed in");
    output.data(&profile);
    output.success(format!(
        "Signed in as {} ({} favorites, {} watched)",
        profile.username, profile.favorites_count, profile.watched_count
    ));
    Ok(())
}

pub async fn run_logout(output: &Output) -> Result<()> {
    let app = App::load()?;
    let was_signed_in = app.is_signed_in();

    app.coordinator
        .logout()
        .map_err(|e| eyre!("Failed to clear local data: {}", e))?;

    let mut credentials = load_credentials(&app.paths)?;
    credentials.clear_session();
    credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;

    if was_signed_in {
        output.success("Signed out and cleared local collections");
    } else {
        output.info("Not signed in; local collections cleared");
    }
    Ok(())
}
