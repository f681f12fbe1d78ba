use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("Authentication failed. Please login again.")]
    AuthenticationRejected,

    #[error("HTTP error! status: {status}")]
    Http { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Login failed (status {0})")]
    LoginFailed(StatusCode),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            ),
        }
    }

    /// Map a non-success status to an error. 401 is the only status
    /// with session semantics; everything else keeps its code.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::AuthenticationRejected;
        }
        ApiError::Http {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// True for the two errors after which the stored session is gone.
    pub fn is_session_terminated(&self) -> bool {
        matches!(
            self,
            ApiError::SessionExpired | ApiError::AuthenticationRejected
        )
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } | ApiError::LoginFailed(status) => Some(*status),
            ApiError::AuthenticationRejected => Some(StatusCode::UNAUTHORIZED),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_unauthorized_is_auth_error() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "nope");
        assert!(matches!(err, ApiError::AuthenticationRejected));
        assert!(err.is_session_terminated());
    }

    #[test]
    fn test_from_status_keeps_other_codes() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!err.is_session_terminated());
        assert_eq!(err.to_string(), "HTTP error! status: 500 Internal Server Error");

        let err = ApiError::from_status(StatusCode::FORBIDDEN, "");
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "é".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"é".repeat(500)));
        assert!(truncated.ends_with("(truncated, 1200 total bytes)"));
    }
}
