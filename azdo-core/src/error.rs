//! Error taxonomy for calls against the Azure DevOps REST API.
//!
//! Every non-2xx response is unwrapped into a [`WrappedError`] and classified
//! by status code into one of the [`AzdoError`] kinds:
//!
//! | HTTP status | Kind |
//! |-------------|------|
//! | `404`, or `400` whose body carries `VS800075` | `NotFound` |
//! | `401`, `403` | `Auth` |
//! | `409` | `Conflict` |
//! | `429` | `RateLimited` |
//! | anything else | `Service` |

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `AzdoError`.
pub type AzdoResult<T> = Result<T, AzdoError>;

/// Azure DevOps answers `400` instead of `404` when the parent project is missing.
pub const MISSING_PROJECT_SENTINEL: &str = "VS800075";

/// Structured error envelope returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<WrappedError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i32>,
    /// Always stamped from the HTTP response, never read from the body.
    #[serde(skip)]
    pub status_code: u16,
}

/// Alternate envelope used by some collection endpoints: `{count, value: {message}}`.
#[derive(Debug, Deserialize)]
struct CollectionErrorEnvelope {
    #[allow(dead_code)]
    count: Option<i64>,
    value: CollectionErrorValue,
}

#[derive(Debug, Deserialize)]
struct CollectionErrorValue {
    message: Option<String>,
}

impl WrappedError {
    /// Decode an error body, accepting both envelope shapes.
    ///
    /// Bodies that match neither shape keep their raw text as the message so
    /// that nothing the server said is lost.
    pub fn from_body(status: StatusCode, body: &[u8]) -> Self {
        let mut error = match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) if value.get("value").is_some_and(|v| v.is_object()) => {
                serde_json::from_value::<CollectionErrorEnvelope>(value)
                    .map(|envelope| WrappedError {
                        message: envelope.value.message,
                        ..Default::default()
                    })
                    .unwrap_or_default()
            }
            Ok(value) if value.is_object() => {
                serde_json::from_value::<WrappedError>(value).unwrap_or_default()
            }
            _ => WrappedError::default(),
        };

        if error.message.is_none() {
            let text = String::from_utf8_lossy(body).trim().to_string();
            error.message = if text.is_empty() {
                status.canonical_reason().map(str::to_string)
            } else {
                Some(text)
            };
        }
        error.status_code = status.as_u16();
        error
    }

    /// Message, falling back to the innermost message when the outer one is empty.
    pub fn message(&self) -> &str {
        match self.message.as_deref() {
            Some(msg) if !msg.is_empty() => msg,
            _ => self
                .inner_exception
                .as_deref()
                .map(WrappedError::message)
                .unwrap_or(""),
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        self.message.as_deref().is_some_and(|m| m.contains(needle))
            || self.type_key.as_deref().is_some_and(|k| k.contains(needle))
            || self
                .inner_exception
                .as_deref()
                .is_some_and(|inner| inner.mentions(needle))
    }
}

impl fmt::Display for WrappedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        match (&self.type_key, message.is_empty()) {
            (Some(key), false) => write!(f, "{} (HTTP {}, {})", message, self.status_code, key),
            (None, false) => write!(f, "{} (HTTP {})", message, self.status_code),
            _ => write!(f, "HTTP {}", self.status_code),
        }
    }
}

/// Errors that can occur while talking to Azure DevOps or reconciling state.
#[derive(Debug, Error)]
pub enum AzdoError {
    /// DNS, TCP, TLS or framing failure; no response body.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(WrappedError),

    #[error("Conflict: {0}")]
    Conflict(WrappedError),

    #[error("Authentication error: {0}")]
    Auth(WrappedError),

    #[error("Too many requests: {error}")]
    RateLimited {
        error: WrappedError,
        retry_after: Option<u64>,
    },

    #[error("Azure DevOps error: {0}")]
    Service(WrappedError),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The desired state cannot be expressed (unknown action, bad kubeconfig, missing identity).
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    #[error("Parent {0} does not exist")]
    ParentMissing(String),

    #[error("Timed out after {elapsed:?} waiting for {operation} (last state: {last_state:?})")]
    Timeout {
        operation: String,
        elapsed: Duration,
        last_state: Option<String>,
    },

    #[error("Unexpected state '{state}' while waiting for {operation}, expected one of {expected:?}")]
    UnexpectedState {
        operation: String,
        state: String,
        expected: Vec<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Changing {0} requires replacing the resource")]
    RequiresReplace(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AzdoError {
    fn from(err: validator::ValidationErrors) -> Self {
        AzdoError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AzdoError {
    fn from(err: config::ConfigError) -> Self {
        AzdoError::Config(err.to_string())
    }
}

impl AzdoError {
    /// Classify a non-2xx response.
    pub fn from_response(status: StatusCode, retry_after: Option<u64>, body: &[u8]) -> Self {
        let error = WrappedError::from_body(status, body);
        match status {
            StatusCode::NOT_FOUND => AzdoError::NotFound(error),
            StatusCode::BAD_REQUEST if error.mentions(MISSING_PROJECT_SENTINEL) => {
                AzdoError::NotFound(error)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AzdoError::Auth(error),
            StatusCode::CONFLICT => AzdoError::Conflict(error),
            StatusCode::TOO_MANY_REQUESTS => AzdoError::RateLimited { error, retry_after },
            _ => AzdoError::Service(error),
        }
    }

    /// The one kind a read handler must catch to mark a resource as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AzdoError::NotFound(_))
    }

    /// `400` + `VS800075`: the owning project is missing.
    pub fn is_missing_parent(&self) -> bool {
        matches!(self, AzdoError::NotFound(e) if e.status_code == StatusCode::BAD_REQUEST.as_u16())
    }

    /// The wrapped server envelope, when the error came from a response.
    pub fn wrapped(&self) -> Option<&WrappedError> {
        match self {
            AzdoError::NotFound(e)
            | AzdoError::Conflict(e)
            | AzdoError::Auth(e)
            | AzdoError::Service(e)
            | AzdoError::RateLimited { error: e, .. } => Some(e),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.wrapped().map(|e| e.status_code)
    }

    /// Short title shown to the host next to the full message.
    pub fn summary(&self) -> &'static str {
        match self {
            AzdoError::Transport(_) => "Request to Azure DevOps failed",
            AzdoError::NotFound(_) => "Resource not found",
            AzdoError::Conflict(_) => "Resource conflict",
            AzdoError::Auth(_) => "Not authorized",
            AzdoError::RateLimited { .. } => "Rate limited by Azure DevOps",
            AzdoError::Service(_) => "Azure DevOps returned an error",
            AzdoError::Decode(_) => "Unexpected response from Azure DevOps",
            AzdoError::Url(_) => "Invalid URL",
            AzdoError::Config(_) => "Invalid provider configuration",
            AzdoError::Validation(_) => "Invalid resource configuration",
            AzdoError::Misconfigured(_) => "Invalid resource configuration",
            AzdoError::ParentMissing(_) => "Parent does not exist",
            AzdoError::Timeout { .. } => "Timed out",
            AzdoError::UnexpectedState { .. } => "Unexpected state",
            AzdoError::Cancelled => "Cancelled",
            AzdoError::RequiresReplace(_) => "Replacement required",
            AzdoError::Internal(_) => "Internal error",
        }
    }

    /// Rewrites a `VS800075` not-found into [`AzdoError::ParentMissing`].
    pub fn parent_context(self, parent: &str) -> Self {
        if self.is_missing_parent() {
            AzdoError::ParentMissing(parent.to_string())
        } else {
            self
        }
    }
}

/// Helpers for the two places where `NotFound` is not an error.
pub trait NotFoundExt<T> {
    /// Read path: `NotFound` means the resource is gone.
    fn optional(self) -> AzdoResult<Option<T>>;

    /// Delete path: deleting something already gone succeeds.
    fn ignore_not_found(self) -> AzdoResult<()>;
}

impl<T> NotFoundExt<T> for AzdoResult<T> {
    fn optional(self) -> AzdoResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn ignore_not_found(self) -> AzdoResult<()> {
        match self {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_envelope_is_decoded() {
        let body = br#"{
            "$id": "1",
            "innerException": null,
            "message": "TF200016: The following project does not exist: demo.",
            "typeName": "Microsoft.TeamFoundation.Core.WebApi.ProjectDoesNotExistException",
            "typeKey": "ProjectDoesNotExistException",
            "errorCode": 0,
            "eventId": 3000
        }"#;

        let err = WrappedError::from_body(StatusCode::NOT_FOUND, body);
        assert_eq!(err.status_code, 404);
        assert_eq!(err.type_key.as_deref(), Some("ProjectDoesNotExistException"));
        assert!(err.message().starts_with("TF200016"));
    }

    #[test]
    fn test_collection_envelope_is_normalized() {
        let body = br#"{"count": 1, "value": {"Message": "ignored", "message": "Bad descriptor"}}"#;
        let err = WrappedError::from_body(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.message(), "Bad descriptor");
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn test_plain_text_body_becomes_message() {
        let err = WrappedError::from_body(StatusCode::BAD_GATEWAY, b"upstream unavailable");
        assert_eq!(err.message(), "upstream unavailable");
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = WrappedError::from_body(StatusCode::INTERNAL_SERVER_ERROR, b"");
        assert_eq!(err.message(), "Internal Server Error");
    }

    #[test]
    fn test_inner_message_is_used_when_outer_is_empty() {
        let body = br#"{"message": "", "innerException": {"message": "inner cause"}}"#;
        let err = WrappedError::from_body(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.message(), "inner cause");
    }

    #[test]
    fn test_404_is_not_found() {
        let err = AzdoError::from_response(StatusCode::NOT_FOUND, None, b"{}");
        assert!(err.is_not_found());
        assert!(!err.is_missing_parent());
    }

    #[test]
    fn test_400_with_sentinel_is_not_found() {
        let body = br#"{"message": "VS800075: The project with id 'abc' does not exist.", "typeKey": "ProjectDoesNotExistWithNameException"}"#;
        let err = AzdoError::from_response(StatusCode::BAD_REQUEST, None, body);
        assert!(err.is_not_found());
        assert!(err.is_missing_parent());
        assert!(matches!(err.parent_context("project"), AzdoError::ParentMissing(p) if p == "project"));
    }

    #[test]
    fn test_plain_400_is_service_error() {
        let body = br#"{"message": "Invalid name"}"#;
        let err = AzdoError::from_response(StatusCode::BAD_REQUEST, None, body);
        assert!(matches!(err, AzdoError::Service(_)));
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            AzdoError::from_response(StatusCode::UNAUTHORIZED, None, b""),
            AzdoError::Auth(_)
        ));
        assert!(matches!(
            AzdoError::from_response(StatusCode::FORBIDDEN, None, b""),
            AzdoError::Auth(_)
        ));
        assert!(matches!(
            AzdoError::from_response(StatusCode::CONFLICT, None, b""),
            AzdoError::Conflict(_)
        ));
        assert!(matches!(
            AzdoError::from_response(StatusCode::TOO_MANY_REQUESTS, Some(30), b""),
            AzdoError::RateLimited { retry_after: Some(30), .. }
        ));
    }

    #[test]
    fn test_optional_and_ignore_not_found() {
        let gone: AzdoResult<u32> = Err(AzdoError::from_response(StatusCode::NOT_FOUND, None, b""));
        assert_eq!(gone.optional().unwrap(), None);

        let gone: AzdoResult<u32> = Err(AzdoError::from_response(StatusCode::NOT_FOUND, None, b""));
        assert!(gone.ignore_not_found().is_ok());

        let failed: AzdoResult<u32> =
            Err(AzdoError::from_response(StatusCode::INTERNAL_SERVER_ERROR, None, b""));
        assert!(failed.optional().is_err());
    }
}
