//! Session engine error types.

use crate::session_fsm::SessionPhase;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Normalized failure of an admin API call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401: missing, expired or invalid credential
    #[error("Authentication failed: {detail}")]
    Authentication { detail: String },

    /// 403: valid credential, insufficient role
    #[error("Not authorized: {detail}")]
    Authorization { detail: String },

    /// 400/422: request rejected by field validation
    #[error("Validation failed: {detail}")]
    Validation { status: u16, detail: String },

    /// 5xx
    #[error("Server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    /// Any other non-2xx status
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// No response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// A 2xx body did not have the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// Request body could not be serialized
    #[error("Request body could not be encoded: {0}")]
    Encode(String),

    /// The session was torn down while the request was in flight
    #[error("Request cancelled: session ended")]
    Cancelled,

    /// Endpoint path could not be joined onto the base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Classify a non-2xx response, extracting a readable detail from its body.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let detail = extract_detail(status, body);
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Authentication { detail },
            StatusCode::FORBIDDEN => ApiError::Authorization { detail },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation {
                status: code,
                detail,
            },
            s if s.is_server_error() => ApiError::Server {
                status: code,
                detail,
            },
            _ => ApiError::Status {
                status: code,
                detail,
            },
        }
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { .. } => Some(401),
            ApiError::Authorization { .. } => Some(403),
            ApiError::Validation { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message suitable for showing inline.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Authentication { detail }
            | ApiError::Authorization { detail }
            | ApiError::Validation { detail, .. }
            | ApiError::Server { detail, .. }
            | ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// True for 401 responses.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ApiError::Authentication { .. })
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Transport failures
    /// - Timeouts
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Timeout | ApiError::Server { .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure to assemble the session runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] console_config::CoreError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Api(#[from] ApiError),
}

/// Event rejected by the session state machine in its current phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot apply {event} while {from}")]
pub struct TransitionError {
    pub from: SessionPhase,
    pub event: &'static str,
}

/// Best-effort readable message from an error body.
///
/// Handles `{"detail": "..."}`, `{"detail": [{"msg": "..."}, ...]}` and falls
/// back to the serialized body, then to the status line.
pub(crate) fn extract_detail(status: StatusCode, body: &[u8]) -> String {
    let status_line = || {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    };

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return status_line(),
    };

    match value.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
        Some(Value::Array(errors)) => {
            let first = errors
                .iter()
                .find_map(|error| error.get("msg").and_then(Value::as_str));
            if let Some(msg) = first {
                return msg.to_string();
            }
        }
        _ => {}
    }

    match value {
        Value::Null => status_line(),
        Value::String(s) if s.is_empty() => status_line(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        let body = br#"{"detail": "Invalid credentials"}"#;
        assert_eq!(
            extract_detail(StatusCode::UNAUTHORIZED, body),
            "Invalid credentials"
        );
    }

    #[test]
    fn test_detail_validation_list_takes_first_message() {
        let body = br#"{"detail": [
            {
                "loc": ["body", "new_password"],
                "msg": "ensure this value has at least 8 characters",
                "type": "value_error"
            },
            {
                "loc": ["body", "current_password"],
                "msg": "field required",
                "type": "value_error.missing"
            }
        ]}"#;
        assert_eq!(
            extract_detail(StatusCode::UNPROCESSABLE_ENTITY, body),
            "ensure this value has at least 8 characters"
        );
    }

    #[test]
    fn test_detail_unrecognized_shape_is_serialized() {
        let body = br#"{"error":"boom"}"#;
        assert_eq!(
            extract_detail(StatusCode::INTERNAL_SERVER_ERROR, body),
            r#"{"error":"boom"}"#
        );
    }

    #[test]
    fn test_detail_unparseable_falls_back_to_status_line() {
        assert_eq!(
            extract_detail(StatusCode::BAD_GATEWAY, b"<html>Bad Gateway</html>"),
            "Bad Gateway"
        );
        assert_eq!(
            extract_detail(StatusCode::SERVICE_UNAVAILABLE, b""),
            "Service Unavailable"
        );
        assert_eq!(extract_detail(StatusCode::FORBIDDEN, b"null"), "Forbidden");
    }

    #[test]
    fn test_from_response_classification() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, br#"{"detail":"expired"}"#);
        assert_eq!(
            err,
            ApiError::Authentication {
                detail: "expired".to_string()
            }
        );
        assert_eq!(err.status(), Some(401));
        assert!(err.is_authentication());

        let err = ApiError::from_response(StatusCode::FORBIDDEN, b"");
        assert!(matches!(err, ApiError::Authorization { .. }));

        let err = ApiError::from_response(StatusCode::UNPROCESSABLE_ENTITY, b"{}");
        assert_eq!(err.status(), Some(422));
        assert!(matches!(err, ApiError::Validation { .. }));

        let err = ApiError::from_response(
            StatusCode::BAD_REQUEST,
            br#"{"detail":"Email already in use"}"#,
        );
        assert_eq!(err.detail(), "Email already in use");

        let err = ApiError::from_response(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert!(err.is_transient());

        let err =
            ApiError::from_response(StatusCode::NOT_FOUND, br#"{"detail":"Solution not found"}"#);
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                detail: "Solution not found".to_string()
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_non_response_errors() {
        assert_eq!(ApiError::Timeout.status(), None);
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Transport("connection refused".to_string()).is_transient());
        assert!(!ApiError::Cancelled.is_transient());
        assert!(!ApiError::Decode("missing field".to_string()).is_transient());
        assert_eq!(ApiError::Cancelled.detail(), "Request cancelled: session ended");
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError {
            from: SessionPhase::Booting,
            event: "logout_requested",
        };
        assert_eq!(err.to_string(), "Cannot apply logout_requested while booting");
    }
}
