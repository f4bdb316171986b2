//! Admin API wire types and in-memory session records.

use serde::{Deserialize, Serialize};
use std::fmt;
use token_store::AdminProfile;

/// Endpoint paths, relative to the configured API base URL.
pub mod endpoints {
    pub const LOGIN: &str = "auth/login";
    pub const REFRESH: &str = "auth/refresh";
    pub const LOGOUT: &str = "auth/logout";
    pub const ME: &str = "auth/me";
    pub const PASSWORD: &str = "auth/password";
    pub const FORGOT_PASSWORD: &str = "auth/forgot-password";
    pub const VERIFY_RESET_TOKEN: &str = "auth/verify-reset-token";
    pub const RESET_PASSWORD: &str = "auth/reset-password";
}

/// `POST auth/login` body.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `POST auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    pub admin: AdminProfile,
}

/// `POST auth/refresh` body.
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `POST auth/refresh` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// `PUT auth/password` body.
#[derive(Serialize)]
pub struct PasswordChangeRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

/// `POST auth/forgot-password` body.
#[derive(Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

/// `POST auth/reset-password` body.
#[derive(Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

/// Plain `{message}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `GET auth/verify-reset-token/{token}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetTokenStatus {
    pub valid: bool,
    /// Masked address of the account the token belongs to.
    #[serde(default)]
    pub email: Option<String>,
    pub message: String,
}

/// Access and refresh token held by an active session.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl From<LoginResponse> for TokenPair {
    fn from(response: LoginResponse) -> Self {
        Self::new(response.access_token, response.refresh_token)
    }
}

impl From<RefreshResponse> for TokenPair {
    fn from(response: RefreshResponse) -> Self {
        Self::new(response.access_token, response.refresh_token)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Tokens plus the admin they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub tokens: TokenPair,
    pub profile: AdminProfile,
}

impl Session {
    pub fn new(tokens: TokenPair, profile: AdminProfile) -> Self {
        Self { tokens, profile }
    }

    /// Same identity, replaced tokens.
    pub fn with_tokens(&self, tokens: TokenPair) -> Self {
        Self {
            tokens,
            profile: self.profile.clone(),
        }
    }
}
