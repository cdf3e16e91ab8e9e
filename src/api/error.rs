use serde::Deserialize;
use thiserror::Error;

/// Error taxonomy for backend calls.
///
/// Every variant carries owned data and the type is `Clone`, so an error
/// can live inside a query cache entry and be handed to every attached
/// caller. `reqwest::Error` is flattened to its display form for the
/// same reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Non-2xx response whose body did not carry a structured message.
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// Non-2xx response with a `{"message": ...}` payload from the backend.
    #[error("{message}")]
    Application { message: String },

    /// Connection, DNS, or timeout failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected entity shape.
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape the academic backend uses for application errors.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Classify a non-success response. A parseable `{"message": ...}`
    /// body becomes an application error, anything else a transport error.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return ApiError::Application {
                message: parsed.message,
            };
        }
        ApiError::Transport {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// True for errors raised before any response arrived.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Result alias used across the API and cache layers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_application_message() {
        let err = ApiError::from_status(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"message": "Mentor not found"}"#,
        );
        assert_eq!(
            err,
            ApiError::Application {
                message: "Mentor not found".to_string()
            }
        );
    }

    #[test]
    fn test_from_status_opaque_body() {
        let err = ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, "<html>oops</html>");
        match err {
            ApiError::Transport { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_truncation() {
        let long_body = "x".repeat(2000);
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &long_body);
        match err {
            ApiError::Transport { body, .. } => {
                assert!(body.len() < 600);
                assert!(body.contains("truncated"));
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
