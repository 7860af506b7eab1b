//! HTTP gateway to the reviews backend.
//!
//! # Architecture
//!
//! - One [`ApiClient`] per process, cloned into every component
//! - The bearer credential lives in the client and is written only by the
//!   session; every request carries it when present
//! - No retries, no caching: failures surface unchanged as [`ApiError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use mapreviews_client::api::ApiClient;
//!
//! let api = session.api();
//! let reviews: Vec<Review> = api.get_json(&["reviews", ""]).await?;
//! ```

mod client;
mod multipart;

pub use client::ApiClient;
pub use multipart::Attachment;

use mapreviews_core::ErrorKind;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connect, DNS, timeout, reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Server-provided detail, or a prefix of the body.
        message: String,
    },

    /// A success response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A local attachment could not be read or encoded.
    #[error("Attachment error: {0}")]
    Attachment(String),
}

impl ApiError {
    /// Classify this failure for state recording.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Status { status, .. } => ErrorKind::from_status(status.as_u16()),
            Self::Decode(_) => ErrorKind::MalformedResponse,
            Self::Attachment(_) => ErrorKind::ValidationFailure,
        }
    }

    /// Response status, for status failures.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Extract a human-readable message from an error body.
///
/// The backend (FastAPI) reports errors as `{"detail": ...}`, where `detail`
/// is a string for handled errors and a list for request validation errors.
fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(detail) = map.get("detail")
    {
        return match detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    trimmed.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Reseña no encontrada".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 Not Found: Reseña no encontrada");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_status_kinds() {
        let kind = |status| {
            ApiError::Status {
                status,
                message: String::new(),
            }
            .kind()
        };
        assert_eq!(kind(StatusCode::UNAUTHORIZED), ErrorKind::AuthorizationFailure);
        assert_eq!(kind(StatusCode::FORBIDDEN), ErrorKind::AuthorizationFailure);
        assert_eq!(kind(StatusCode::UNPROCESSABLE_ENTITY), ErrorKind::ValidationFailure);
        assert_eq!(kind(StatusCode::INTERNAL_SERVER_ERROR), ErrorKind::ServerFailure);
    }

    #[test]
    fn test_decode_and_attachment_kinds() {
        let decode = serde_json::from_str::<u8>("nope").map_err(ApiError::from);
        assert!(matches!(decode, Err(ref e) if e.kind() == ErrorKind::MalformedResponse));

        let attachment = ApiError::Attachment("missing file".to_string());
        assert_eq!(attachment.kind(), ErrorKind::ValidationFailure);
        assert!(attachment.status().is_none());
    }

    #[test]
    fn test_error_message_string_detail() {
        assert_eq!(
            error_message(r#"{"detail": "Token inválido"}"#),
            "Token inválido"
        );
    }

    #[test]
    fn test_error_message_validation_detail() {
        let message = error_message(r#"{"detail": [{"loc": ["body", "rating"], "msg": "too big"}]}"#);
        assert!(message.contains("too big"));
    }

    #[test]
    fn test_error_message_plain_body_is_truncated() {
        let body = "x".repeat(500);
        assert_eq!(error_message(&body).len(), 200);
        assert_eq!(error_message("  "), "(empty response body)");
    }
}
