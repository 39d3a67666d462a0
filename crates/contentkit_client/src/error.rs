//! Error types for content requests.

use contentkit_cache::CacheError;
use contentkit_query::QueryError;
use serde_json::Value;
use thiserror::Error;

/// Result type for content requests.
pub type ContentResult<T> = Result<T, ContentError>;

/// Message used when a failed response carries none of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "Oops! Something went wrong. Please try again.";

/// Broad class of a [`ContentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No network path was available when one was required.
    Connectivity,
    /// Credentials or configuration were missing before a request was made.
    Configuration,
    /// A cache-only read found nothing usable.
    CacheMiss,
    /// A request builder was in an invalid state.
    Predicate,
    /// The server answered with a failure or an unreadable body.
    Transport,
    /// Reading or writing the local cache failed.
    Persistence,
}

/// Errors delivered to request callbacks.
#[derive(Debug, Error)]
pub enum ContentError {
    /// A network request was needed while offline.
    #[error("network not available")]
    NoConnectivity,

    /// The merged request headers lack required credentials.
    #[error("missing required headers: {}", missing.join(", "))]
    MissingHeaders {
        /// Names of the absent headers.
        missing: Vec<String>,
    },

    /// The stack configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No usable cache record exists for the request.
    #[error("entry not in cache")]
    NotInCache,

    /// A builder method received an invalid argument.
    #[error("malformed request from {operation}: {reason}")]
    MalformedPredicate {
        /// Builder method that recorded the error.
        operation: String,
        /// What was wrong.
        reason: String,
    },

    /// The server rejected the request.
    #[error("request failed with status {status}: {message}")]
    Transport {
        /// HTTP status, or 0 when no response was received.
        status: u16,
        /// Server-supplied message, or [`DEFAULT_ERROR_MESSAGE`].
        message: String,
        /// Server-supplied error code.
        code: Option<i64>,
        /// Server-supplied per-field errors.
        errors: Option<Value>,
    },

    /// A response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The local cache failed.
    #[error("cache error: {0}")]
    Persistence(#[from] CacheError),

    /// A background task ended abnormally.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ContentError {
    /// Builds a transport error from a failed response body shaped as
    /// `{error_message, error_code, errors}`.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = body
            .get("error_message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string();
        Self::Transport {
            status,
            message,
            code: body.get("error_code").and_then(Value::as_i64),
            errors: body.get("errors").filter(|e| !e.is_null()).cloned(),
        }
    }

    /// Returns the broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::NoConnectivity => ErrorKind::Connectivity,
            ContentError::MissingHeaders { .. } | ContentError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            ContentError::NotInCache => ErrorKind::CacheMiss,
            ContentError::MalformedPredicate { .. } => ErrorKind::Predicate,
            ContentError::Transport { .. }
            | ContentError::Decode(_)
            | ContentError::Internal(_) => ErrorKind::Transport,
            ContentError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Returns a stable numeric code.
    ///
    /// Transport errors report their HTTP status; the other classes use
    /// small fixed codes below 100.
    pub fn code(&self) -> i64 {
        match self {
            ContentError::NoConnectivity => 0,
            ContentError::MissingHeaders { .. } | ContentError::InvalidConfig(_) => 1,
            ContentError::NotInCache => 2,
            ContentError::MalformedPredicate { .. } => 3,
            ContentError::Persistence(_) => 4,
            ContentError::Decode(_) => 5,
            ContentError::Internal(_) => 6,
            ContentError::Transport { status, .. } => i64::from(*status),
        }
    }
}

impl From<QueryError> for ContentError {
    fn from(err: QueryError) -> Self {
        let operation = err.operation().to_string();
        let reason = match err {
            QueryError::InvalidArgument { reason, .. } => reason,
            QueryError::EmptyCombinator { .. } => "no queries given".to_string(),
        };
        ContentError::MalformedPredicate { operation, reason }
    }
}
