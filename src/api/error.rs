use reqwest::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a call to the LMS can fail.
///
/// Built once at the HTTP boundary (see `ApiError::from_status`) so callers
/// match on a closed set instead of poking at response bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API token or unauthorized access")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error("Rate limit exceeded. Please try again later")]
    RateLimited,

    /// Any other non-success status.
    #[error("{message}")]
    Remote { message: String, status: u16 },

    /// No response at all: DNS, connect, TLS or timeout failures.
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Could not parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API token contains characters that cannot be sent in a header")]
    InvalidToken,

    #[error(
        "{operation} failed{}: {source}",
        .source.status().map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
    )]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Maps a non-success response to its error kind. `body` is the raw
    /// response text, searched for a service-provided message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            _ => ApiError::Remote {
                message: remote_message(body).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
                }),
                status: status.as_u16(),
            },
        }
    }

    /// HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::NotFound => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::Remote { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Operation { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Innermost error, looking through operation context.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn during(self, operation: &'static str) -> Self {
        ApiError::Operation {
            operation,
            source: Box::new(self),
        }
    }
}

/// Pulls `message`, or the first `errors[].message`, out of an error body.
fn remote_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
