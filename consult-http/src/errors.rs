//! HTTP error types and classification

use consult_resilience::Retryable;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// User-facing message text
pub mod messages {
    pub const NETWORK_ERROR: &str = "Network error. Please check your connection and try again.";
    pub const TIMEOUT: &str = "Request timeout. Please try again.";
    pub const UNAUTHORIZED: &str = "You are not authorized to access this resource.";
    pub const FORBIDDEN: &str = "You do not have permission to perform this action.";
    pub const NOT_FOUND: &str = "The requested resource was not found.";
    pub const RATE_LIMITED: &str = "Too many requests. Please try again later.";
    pub const SERVER_ERROR: &str = "Server error. Please try again later.";
    pub const VALIDATION_ERROR: &str = "Please check your input and try again.";
    pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
    pub const CIRCUIT_OPEN: &str =
        "Service is temporarily unavailable. Please try again in a few moments.";
    pub const CANCELLED: &str = "Request was cancelled.";
    pub const UNEXPECTED: &str = "An unexpected error occurred.";
    pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";
}

/// Result type for client calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure below HTTP: no response was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Request could not be built: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

/// One entry of a 422 response's `errors` array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

/// Classified outcome of a failed call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Session expired")]
    AuthExpired,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: Vec<FieldError>,
    },

    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ApiError::Timeout,
            TransportError::Connect(message) | TransportError::Io(message) => {
                ApiError::Network(message)
            }
            TransportError::InvalidRequest(message) => ApiError::InvalidRequest(message),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl ApiError {
    /// Classify a non-2xx response.
    ///
    /// The backend's `message` (or `error`) field is kept when present.
    pub fn from_response(status: u16, headers: &BTreeMap<String, String>, body: &[u8]) -> Self {
        let payload: Option<Value> = serde_json::from_slice(body).ok();
        let backend_message = payload.as_ref().and_then(|payload| {
            payload
                .get("message")
                .or_else(|| payload.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        match status {
            422 => {
                let field_errors = payload
                    .as_ref()
                    .and_then(|payload| payload.get("errors"))
                    .and_then(|errors| {
                        serde_json::from_value::<Vec<FieldError>>(errors.clone()).ok()
                    })
                    .unwrap_or_default();
                ApiError::Validation {
                    message: backend_message
                        .unwrap_or_else(|| messages::VALIDATION_ERROR.to_string()),
                    field_errors,
                }
            }
            429 => ApiError::RateLimited {
                retry_after: headers
                    .get("retry-after")
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .map(Duration::from_secs),
            },
            500..=599 => ApiError::Server {
                status,
                message: backend_message.unwrap_or_else(|| messages::SERVER_ERROR.to_string()),
            },
            _ => {
                let fallback = match status {
                    401 => messages::UNAUTHORIZED,
                    403 => messages::FORBIDDEN,
                    404 => messages::NOT_FOUND,
                    _ => messages::UNEXPECTED,
                };
                ApiError::Client {
                    status,
                    message: backend_message.unwrap_or_else(|| fallback.to_string()),
                }
            }
        }
    }

    /// HTTP status behind this error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::AuthExpired => Some(401),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Validation { .. } => Some(422),
            _ => None,
        }
    }

    /// Text to show the user for this error
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => messages::NETWORK_ERROR.to_string(),
            ApiError::Timeout => messages::TIMEOUT.to_string(),
            ApiError::Client { status: 403, .. } => messages::FORBIDDEN.to_string(),
            ApiError::Client { status: 404, .. } => messages::NOT_FOUND.to_string(),
            ApiError::Client { message, .. } => message.clone(),
            ApiError::AuthExpired => messages::SESSION_EXPIRED.to_string(),
            ApiError::Server { status: 500, .. } => messages::SERVER_ERROR.to_string(),
            ApiError::Server { message, .. } => message.clone(),
            ApiError::RateLimited { .. } => messages::RATE_LIMITED.to_string(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::CircuitOpen => messages::CIRCUIT_OPEN.to_string(),
            ApiError::Cancelled => messages::CANCELLED.to_string(),
            ApiError::Decode(_) | ApiError::InvalidRequest(_) => {
                messages::GENERIC_ERROR.to_string()
            }
        }
    }

    /// Messages to surface for this error, one per field error for 422s
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            ApiError::Validation { field_errors, .. } if !field_errors.is_empty() => field_errors
                .iter()
                .map(|error| error.message.clone())
                .collect(),
            other => vec![other.user_message()],
        }
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_)
                | ApiError::Timeout
                | ApiError::Server { .. }
                | ApiError::RateLimited { .. }
        )
    }

    fn retry_delay(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(status: u16, body: Value) -> ApiError {
        ApiError::from_response(status, &BTreeMap::new(), body.to_string().as_bytes())
    }

    #[test]
    fn test_client_errors_prefer_backend_message() {
        let error = classify(400, json!({"message": "Email already registered"}));
        assert_eq!(
            error,
            ApiError::Client {
                status: 400,
                message: "Email already registered".to_string()
            }
        );
        assert_eq!(error.user_message(), "Email already registered");

        let error = classify(409, json!({"error": "Duplicate application"}));
        assert_eq!(error.user_message(), "Duplicate application");

        let error = ApiError::from_response(418, &BTreeMap::new(), b"<html>teapot</html>");
        assert_eq!(error.user_message(), messages::UNEXPECTED);
    }

    #[test]
    fn test_forbidden_and_not_found_use_fixed_messages() {
        assert_eq!(classify(403, json!({})).user_message(), messages::FORBIDDEN);
        assert_eq!(
            classify(404, json!({"message": "No doctor 9"})).user_message(),
            messages::NOT_FOUND
        );
    }

    #[test]
    fn test_validation_errors_carry_fields() {
        let error = classify(
            422,
            json!({
                "message": "Invalid application",
                "errors": [
                    {"field": "description", "message": "Description is too short"},
                    {"message": "A report file is required"}
                ]
            }),
        );

        match &error {
            ApiError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.len(), 2);
                assert_eq!(field_errors[0].field.as_deref(), Some("description"));
                assert_eq!(field_errors[1].field, None);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
        assert_eq!(
            error.user_messages(),
            vec!["Description is too short", "A report file is required"]
        );
        assert_eq!(
            classify(422, json!({})).user_messages(),
            vec![messages::VALIDATION_ERROR]
        );
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = BTreeMap::new();
        headers.insert("retry-after".to_string(), "2".to_string());

        let error = ApiError::from_response(429, &headers, b"");
        assert_eq!(error.retry_delay(), Some(Duration::from_secs(2)));
        assert!(error.is_retryable());

        let error = ApiError::from_response(429, &BTreeMap::new(), b"");
        assert_eq!(error.retry_delay(), None);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(classify(503, json!({})).is_retryable());

        assert!(!classify(400, json!({})).is_retryable());
        assert!(!classify(404, json!({})).is_retryable());
        assert!(!classify(422, json!({})).is_retryable());
        assert!(!ApiError::AuthExpired.is_retryable());
        assert!(!ApiError::CircuitOpen.is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
    }

    #[test]
    fn test_server_messages() {
        assert_eq!(classify(500, json!({"message": "boom"})).user_message(), messages::SERVER_ERROR);
        assert_eq!(classify(503, json!({"message": "Down for maintenance"})).user_message(), "Down for maintenance");
        assert_eq!(classify(502, json!(null)).user_message(), messages::SERVER_ERROR);
    }

    #[test]
    fn test_transport_errors_map_to_network_kinds() {
        assert_eq!(ApiError::from(TransportError::Timeout), ApiError::Timeout);
        assert!(matches!(
            ApiError::from(TransportError::Connect("refused".into())),
            ApiError::Network(_)
        ));
        assert!(!ApiError::from(TransportError::InvalidRequest("bad".into())).is_retryable());
    }
}
