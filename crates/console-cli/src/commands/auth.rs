//! Authentication commands.

use super::{prompt_line, prompt_new_password, prompt_secret};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_engine::{ConsoleRuntime, SessionState};

/// Login with username and password.
pub async fn login(
    runtime: &ConsoleRuntime,
    username: Option<String>,
    from: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let manager = runtime.manager();

    if let Some(profile) = manager.profile() {
        output::print_success(&format!("Already logged in as {}", profile.username), format);
        return Ok(());
    }

    let username = match username {
        Some(username) => username,
        None => prompt_line("Username: ")?,
    };
    if username.is_empty() {
        anyhow::bail!("Username is required");
    }
    let password = prompt_secret("Password: ")?;

    match manager.login(&username, &password).await? {
        SessionState::Authenticated(session) => {
            let destination = runtime.gate().destination_after_login(from.as_deref());
            match format {
                OutputFormat::Text => {
                    println!(
                        "Logged in as {} ({})",
                        session.profile.display_name, session.profile.role
                    );
                    println!("Continue to {}", destination);
                }
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "status": "success",
                    "username": session.profile.username,
                    "role": session.profile.role,
                    "destination": destination,
                }))?,
            }
            Ok(())
        }
        SessionState::Unauthenticated(Some(error)) => anyhow::bail!("Login failed: {}", error),
        other => anyhow::bail!("Login did not complete (state: {})", other.phase()),
    }
}

/// Logout and clear the stored session.
pub async fn logout(runtime: &ConsoleRuntime, format: &OutputFormat) -> Result<()> {
    let was_authenticated = runtime.manager().is_authenticated();
    runtime.manager().logout().await;

    if was_authenticated {
        output::print_success("Logged out successfully", format);
    } else {
        output::print_success("Not logged in", format);
    }
    Ok(())
}

/// Show the session status.
pub async fn status(runtime: &ConsoleRuntime, format: &OutputFormat) -> Result<()> {
    let status = runtime.status();

    match format {
        OutputFormat::Text => {
            output::print_row("API", &status.api_base_url);
            if status.authenticated {
                output::print_row("Auth", "logged in");
                if let (Some(username), Some(display_name)) =
                    (&status.username, &status.display_name)
                {
                    output::print_row("User", &format!("{} ({})", username, display_name));
                }
                if let Some(email) = &status.email {
                    output::print_row("Email", email);
                }
                if let Some(role) = status.role {
                    output::print_row("Role", role.as_str());
                }
            } else {
                output::print_row("Auth", "not logged in");
            }
            if let Some(error) = &status.error {
                output::print_row("Error", error);
            }
        }
        OutputFormat::Json => output::print_json(&status)?,
    }

    Ok(())
}

/// Change the signed-in admin's password.
pub async fn password(runtime: &ConsoleRuntime, format: &OutputFormat) -> Result<()> {
    if !runtime.manager().is_authenticated() {
        anyhow::bail!("Not logged in. Run 'partner-console login' first");
    }

    let current = prompt_secret("Current password: ")?;
    let new_password = prompt_new_password()?;

    let response = runtime
        .manager()
        .change_password(&current, &new_password)
        .await?;
    output::print_success(&response.message, format);
    Ok(())
}

/// Request a password reset email.
pub async fn forgot_password(
    runtime: &ConsoleRuntime,
    email: &str,
    format: &OutputFormat,
) -> Result<()> {
    let response = runtime.manager().request_password_reset(email).await?;
    output::print_success(&response.message, format);
    Ok(())
}

/// Set a new password with a reset token.
pub async fn reset_password(
    runtime: &ConsoleRuntime,
    token: &str,
    format: &OutputFormat,
) -> Result<()> {
    let manager = runtime.manager();

    let status = manager.verify_reset_token(token).await?;
    if !status.valid {
        anyhow::bail!("{}", status.message);
    }
    if let (OutputFormat::Text, Some(email)) = (format, &status.email) {
        println!("Resetting password for {}", email);
    }

    let new_password = prompt_new_password()?;
    let response = manager.reset_password(token, &new_password).await?;
    output::print_success(&response.message, format);
    Ok(())
}
