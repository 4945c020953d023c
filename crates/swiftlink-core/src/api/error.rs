use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::RenewalError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success response, passed through as the server sent it.
    #[error("Request failed ({status}): {}", detail(.message, .body))]
    Status {
        status: StatusCode,
        /// Machine-readable `code` from the JSON error body
        code: Option<String>,
        /// Human-readable `message` from the JSON error body
        message: Option<String>,
        /// Raw body, truncated
        body: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Session expired: {0}")]
    Renewal(#[from] RenewalError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        ApiError::Status {
            status,
            code: parsed.code,
            message: parsed.message,
            body: Self::truncate_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// A 401 carrying exactly the expired-token code. Any other 401 is a
    /// plain rejection and must not trigger renewal.
    pub fn is_credential_expired(&self, expired_code: &str) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED) && self.code() == Some(expired_code)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The session is gone and the user has to log in again.
    pub fn is_session_terminated(&self) -> bool {
        matches!(self, ApiError::Renewal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_parses_error_body() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code": "TOKEN_EXPIRED", "message": "Access token expired"}"#,
        );
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.code(), Some("TOKEN_EXPIRED"));
        assert!(err.is_credential_expired("TOKEN_EXPIRED"));
        assert!(!err.is_credential_expired("CREDENTIAL_EXPIRED"));
        assert_eq!(
            err.to_string(),
            "Request failed (401 Unauthorized): Access token expired"
        );
    }

    #[test]
    fn test_plain_unauthorized_is_not_expiry() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "Unauthorized");
        assert!(err.is_unauthorized());
        assert_eq!(err.code(), None);
        assert!(!err.is_credential_expired("TOKEN_EXPIRED"));
        assert_eq!(err.to_string(), "Request failed (401 Unauthorized): Unauthorized");
    }

    #[test]
    fn test_expired_code_on_other_status_is_not_expiry() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN, r#"{"code": "TOKEN_EXPIRED"}"#);
        assert!(!err.is_credential_expired("TOKEN_EXPIRED"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.ends_with(&format!("(truncated, {} total bytes)", body.len())));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_renewal_error_is_terminal() {
        let err = ApiError::from(RenewalError::MissingCredential);
        assert!(err.is_session_terminated());
        assert_eq!(err.status(), None);
    }
}
