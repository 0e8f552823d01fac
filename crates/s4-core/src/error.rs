//! Error types for S4 operations.
//!
//! Every failure surfaced by the S4 clients is an [`Error`]. Transport errors from
//! `reqwest`, URL parse failures and result decoding failures convert into it, and
//! HTTP status codes returned by the service are classified with
//! [`Error::from_status`].

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for S4 operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// S4 service is unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Failed to decode a SPARQL results document
    #[error("Failed to parse SPARQL results: {0}")]
    ResultsParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for service: {0}")]
    Timeout(String),

    /// Repository or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service rejected the query or update
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// API key or secret rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for S4 operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::ResultsParseError(_) => "RESULTS_PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns true if the failure is transient and the request may be retried.
    ///
    /// Only timeouts, connection failures and 429/5xx answers qualify; an unexpected
    /// status or a malformed response is returned to the caller at once.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }

    /// Classify a non-success HTTP status returned by the service.
    ///
    /// `service` names the API in the message (e.g. `"SPARQL"`), `message` is the
    /// error text extracted from the response body.
    #[must_use]
    pub fn from_status(service: &str, status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::BAD_REQUEST => Self::BadRequest(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::AuthenticationFailed(format!("{service} rejected credentials: {message}"))
            }
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                Self::ServiceUnavailable(format!("{service} temporarily unavailable: {message}"))
            }
            status if status.is_server_error() => {
                Self::ServiceUnavailable(format!("{service} server error {status}: {message}"))
            }
            _ => Self::HttpError(format!(
                "{service} returned unexpected status {status}: {message}"
            )),
        }
    }
}

/// Extract a human readable message from an error response body.
///
/// JSON bodies contribute their `message` (or `error`) field when present, XML
/// bodies the text of their `message` element (or their first text); any other
/// body is returned as is.
#[must_use]
pub fn error_message(content_type: Option<&str>, body: &str) -> String {
    let content_type = content_type.unwrap_or_default();
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            for key in ["message", "error"] {
                if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
                    return text.to_string();
                }
            }
        }
    } else if content_type.contains("xml") {
        if let Some(text) = xml_message(body) {
            return text;
        }
    }

    if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    }
}

fn xml_message(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut element: Option<Vec<u8>> = None;
    let mut first_text = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => element = Some(start.local_name().as_ref().to_vec()),
            Ok(Event::End(_)) => element = None,
            Ok(Event::Text(text)) => {
                let Ok(text) = text.unescape() else { continue };
                if text.is_empty() {
                    continue;
                }
                if matches!(element.as_deref(), Some(b"message")) {
                    return Some(text.into_owned());
                }
                first_text.get_or_insert_with(|| text.into_owned());
            }
            Ok(Event::Eof) | Err(_) => return first_text,
            Ok(_) => {}
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ResultsParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
