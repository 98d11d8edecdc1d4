//! Unified error types for costmap.
//!
//! Every failure that reaches a caller is reported with one code from the
//! closed [`ErrorCode`] set.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite;

/// Closed taxonomy of error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParams,
    NotFound,
    RateLimited,
    UpstreamError,
    CacheError,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "INVALID_PARAMS",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::CacheError => "CACHE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP-style status associated with the code.
    pub const fn status(self) -> u16 {
        match self {
            Self::InvalidParams => 400,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::UpstreamError => 502,
            Self::CacheError => 503,
            Self::InternalError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the aggregation layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing query input.
    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    /// The location resolved but has no associated data.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Request quota exceeded for the caller.
    #[error("RATE_LIMITED: retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Non-2xx response, timeout, or malformed vendor payload.
    #[error("UPSTREAM_ERROR: {feed}: {message}")]
    Upstream { feed: String, message: String },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A per-source upstream credential is not configured.
    #[error("MISSING_CREDENTIAL: {field} ({hint})")]
    MissingCredential { field: String, hint: String },

    /// Unexpected or uncategorized failure.
    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

impl Error {
    pub fn upstream(feed: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream { feed: feed.into(), message: message.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidParams(_) => ErrorCode::InvalidParams,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::RateLimited { .. } => ErrorCode::RateLimited,
            Error::Upstream { .. } => ErrorCode::UpstreamError,
            Error::Database(_) | Error::MigrationFailed(_) => ErrorCode::CacheError,
            Error::MissingCredential { .. } | Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> u16 {
        self.code().status()
    }

    /// Caller-facing description. Internal and storage detail is withheld.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidParams(msg) | Error::NotFound(msg) => msg.clone(),
            Error::RateLimited { retry_after } => format!("rate limit exceeded, retry after {retry_after}s"),
            Error::Upstream { feed, message } => format!("{feed}: {message}"),
            Error::Database(_) | Error::MigrationFailed(_) => "cache store unavailable".to_string(),
            Error::MissingCredential { .. } | Error::Internal(_) => "internal error".to_string(),
        }
    }

    /// Structured body for envelopes and per-item batch results.
    pub fn to_body(&self) -> ErrorBody {
        let code = self.code();
        let retry_after = match self {
            Error::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        ErrorBody { code, message: self.public_message(), status: code.status(), retry_after }
    }
}

/// Serializable error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("ZIP 99999".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("99999"));
    }

    #[test]
    fn test_error_codes_and_status() {
        assert_eq!(Error::InvalidParams("x".into()).status(), 400);
        assert_eq!(Error::NotFound("x".into()).status(), 404);
        assert_eq!(Error::RateLimited { retry_after: 3 }.status(), 429);
        assert_eq!(Error::upstream("energy", "status 500").status(), 502);
        assert_eq!(Error::MigrationFailed("x".into()).code(), ErrorCode::CacheError);
        assert_eq!(Error::Internal("boom".into()).status(), 500);
    }

    #[test]
    fn test_missing_credential_is_internal() {
        let err = Error::MissingCredential { field: "eia_api_key".into(), hint: "set it".into() };
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn test_body_withholds_internal_detail() {
        let body = Error::Internal("pointer was null at 0xdead".into()).to_body();
        assert_eq!(body.code, ErrorCode::InternalError);
        assert!(!body.message.contains("0xdead"));
    }

    #[test]
    fn test_rate_limited_body_carries_retry_after() {
        let body = Error::RateLimited { retry_after: 42 }.to_body();
        assert_eq!(body.retry_after, Some(42));
        assert_eq!(body.status, 429);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "RATE_LIMITED");
    }
}
