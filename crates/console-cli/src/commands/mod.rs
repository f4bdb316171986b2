//! CLI command implementations.

mod api;
mod auth;

pub use api::{open, request};
pub use auth::{forgot_password, login, logout, password, reset_password, status};

use anyhow::Result;
use std::io::{self, Write};

/// Read a line from stdin after showing `prompt`.
fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Read a password without echo. Empty input is an error.
fn prompt_secret(prompt: &str) -> Result<String> {
    let secret = rpassword::prompt_password(prompt)?;
    if secret.is_empty() {
        anyhow::bail!("{} is required", prompt.trim_end_matches([':', ' ']));
    }
    Ok(secret)
}

/// Prompt twice for a new password and require both entries to match.
fn prompt_new_password() -> Result<String> {
    let password = prompt_secret("New password: ")?;
    let confirm = prompt_secret("Confirm new password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}
