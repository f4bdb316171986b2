//! Configuration management for the console.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default admin API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/admin";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Login entry point that unauthenticated navigation is redirected to.
pub const DEFAULT_LOGIN_PATH: &str = "/admin/login";

/// Where a successful login lands when no destination was captured.
pub const DEFAULT_LANDING_PATH: &str = "/admin";

const ENV_LOG_LEVEL: &str = "PARTNER_CONSOLE_LOG_LEVEL";
const ENV_API_URL: &str = "PARTNER_CONSOLE_API_URL";
const ENV_REQUEST_TIMEOUT: &str = "PARTNER_CONSOLE_REQUEST_TIMEOUT_SECS";

/// Main console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Admin API base URL, e.g. `https://partners.example.com/api/admin`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout applied to every outbound API request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Login route used by the session gate.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Route a login lands on when no destination was captured.
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_landing_path() -> String {
    DEFAULT_LANDING_PATH.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            login_path: default_login_path(),
            landing_path: default_landing_path(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Blank values are ignored, as are
    /// timeouts that do not parse as a positive integer.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(secs) = non_empty(ENV_REQUEST_TIMEOUT).and_then(|raw| raw.parse::<u64>().ok())
        {
            if secs > 0 {
                self.request_timeout_secs = secs;
            }
        }
    }

    /// Get the API base URL, normalised with a trailing slash so relative
    /// endpoint paths join underneath it.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let raw = self.api_base_url.trim();
        let normalised = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        let url = Url::parse(&normalised)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "API base URL must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
