//! Gated navigation and raw admin API requests.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use session_engine::{ApiRequest, ConsoleRuntime, GateDecision, Method};
use tracing::debug;

/// Run the session gate for a protected path.
pub async fn open(runtime: &ConsoleRuntime, path: &str, format: &OutputFormat) -> Result<()> {
    let decision = runtime.gate().resolve(path).await;

    if let OutputFormat::Json = format {
        return output::print_json(&decision);
    }

    match decision {
        GateDecision::Render => println!("Access granted: {}", path),
        GateDecision::Redirect(redirect) => {
            println!("Login required: redirecting to {}", redirect.to);
            println!(
                "Run 'partner-console login --from {}' to continue",
                redirect.from
            );
        }
        GateDecision::Loading => println!("Session is still loading"),
    }
    Ok(())
}

/// Send an authenticated request and print the response body.
pub async fn request(
    runtime: &ConsoleRuntime,
    method: &str,
    path: &str,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let method = parse_method(method)?;
    let mut request = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data must be valid JSON")?;
        request = request.json_value(body);
    }

    let response = runtime.manager().send(&request).await?;
    debug!(status = %response.status(), "Request completed");

    match format {
        OutputFormat::Json => output::print_json(&response.json_value())?,
        OutputFormat::Text => {
            let body = response.json_value();
            match body {
                serde_json::Value::Null => println!("{}", response.status()),
                serde_json::Value::String(text) => println!("{}", text),
                other => output::print_json(&other)?,
            }
        }
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))
}
