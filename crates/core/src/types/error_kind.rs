//! Failure taxonomy shared by every component.

use serde::{Deserialize, Serialize};

/// Classification of a failed remote operation.
///
/// Collection synchronizers record the kind of their last failure; callers
/// use it to decide on UI feedback without inspecting transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (connect, DNS, timeout, reset).
    NetworkFailure,
    /// The credential is missing, rejected or expired (401/403).
    AuthorizationFailure,
    /// The server rejected the request as malformed (400/422), or the local
    /// payload could not be built.
    ValidationFailure,
    /// The addressed resource does not exist (404).
    NotFound,
    /// Any other non-success status, typically 5xx.
    ServerFailure,
    /// A success response whose body could not be decoded.
    MalformedResponse,
}

impl ErrorKind {
    /// Classify an HTTP status code that is known to be a failure.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthorizationFailure,
            400 | 422 => Self::ValidationFailure,
            404 => Self::NotFound,
            _ => Self::ServerFailure,
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NetworkFailure => "network failure",
            Self::AuthorizationFailure => "not authorized",
            Self::ValidationFailure => "rejected as invalid",
            Self::NotFound => "not found",
            Self::ServerFailure => "server error",
            Self::MalformedResponse => "malformed response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
