use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Not logged in")]
    NoSession,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{message} (status {status})")]
    Application { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer the backend's `message` field over the raw body
    fn describe_body(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .as_ref()
            .and_then(message_from_json)
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::describe_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::ServerError {
                status: code,
                message,
            },
            code => ApiError::Http {
                status: code,
                message,
            },
        }
    }

    /// The HTTP or embedded status behind this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError { status, .. }
            | ApiError::Http { status, .. }
            | ApiError::Application { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }
}

/// Pull a human-readable message out of an error body.
///
/// Validation failures arrive as an array of messages.
pub(crate) fn message_from_json(value: &Value) -> Option<String> {
    match value.get("message")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_known_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(ref m) if m == "nope"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, ""),
            ApiError::Http { status: 409, .. }
        ));
    }

    #[test]
    fn test_from_status_prefers_json_message() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"statusCode":401,"message":"Invalid token"}"#,
        );
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid token"));

        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":["email must be an email","otp should not be empty"]}"#,
        );
        assert!(matches!(
            err,
            ApiError::Http { status: 400, ref message }
                if message == "email must be an email, otp should not be empty"
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        let err = ApiError::from_status(StatusCode::NOT_FOUND, &body);
        match err {
            ApiError::NotFound(m) => {
                assert!(m.len() < 600);
                assert!(m.ends_with("(truncated, 2000 total bytes)"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_of_local_errors() {
        assert_eq!(ApiError::SessionExpired.status(), None);
        assert_eq!(ApiError::NoSession.status(), None);
        assert_eq!(
            ApiError::Application {
                status: 404,
                message: "Not found".into()
            }
            .status(),
            Some(404)
        );
        assert!(ApiError::Unauthorized(String::new()).is_unauthorized());
        assert!(ApiError::AccessDenied(String::new()).is_forbidden());
    }
}
