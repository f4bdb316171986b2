//! Partner console CLI - session-aware client for the admin API.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console_config::{init_logging, Config, LogFormat, Paths};
use session_engine::ConsoleRuntime;
use tracing::debug;

/// Partner console CLI - Sign in to the admin API and call it on your behalf.
#[derive(Parser)]
#[command(name = "partner-console")]
#[command(about = "Partner console CLI for admin authentication and API access")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username and password
    Login {
        /// Admin username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Path to continue to after login
        #[arg(long)]
        from: Option<String>,
    },

    /// Logout and clear the stored session
    Logout,

    /// Show authentication status
    Status,

    /// Check whether a protected console path is accessible
    Open {
        /// Console path, e.g. /admin/solutions
        path: String,
    },

    /// Send an authenticated request to the admin API
    Request {
        /// HTTP method
        method: String,
        /// Endpoint path relative to the API base URL
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Change your password
    Password,

    /// Request a password reset email
    ForgotPassword {
        /// Account email address
        email: String,
    },

    /// Set a new password using a reset token
    ResetPassword {
        /// Token from the reset email
        token: String,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let log_format = match cli.format {
        output::OutputFormat::Text => LogFormat::Text,
        output::OutputFormat::Json => LogFormat::Json,
    };
    init_logging(level, log_format);

    let runtime = ConsoleRuntime::new(config, paths)?;
    let state = runtime.boot().await;
    debug!(state = %state.phase(), "Session resolved");

    let format = &cli.format;
    match cli.command {
        Commands::Login { username, from } => {
            commands::login(&runtime, username, from, format).await
        }
        Commands::Logout => commands::logout(&runtime, format).await,
        Commands::Status => commands::status(&runtime, format).await,
        Commands::Open { path } => commands::open(&runtime, &path, format).await,
        Commands::Request { method, path, data } => {
            commands::request(&runtime, &method, &path, data.as_deref(), format).await
        }
        Commands::Password => commands::password(&runtime, format).await,
        Commands::ForgotPassword { email } => {
            commands::forgot_password(&runtime, &email, format).await
        }
        Commands::ResetPassword { token } => {
            commands::reset_password(&runtime, &token, format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
