use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::io::ErrorKind;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum HavenError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("authority returned HTTP {0}")]
    AuthorityStatus(StatusCode),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("credential validation failed")]
    Unauthorized,

    #[error("missing {0} in request")]
    MissingField(&'static str),

    #[error("no stored data")]
    NotFound,

    #[error("save interval not elapsed")]
    RateLimited,

    #[error("storage limit exceeded: {required} of {limit} bytes")]
    QuotaExceeded { limit: u64, required: u64 },

    #[error("{field} size {size} exceeds hard limit of {limit} bytes")]
    PayloadTooLarge {
        field: &'static str,
        limit: u64,
        size: u64,
    },
}

/// Transient/permanent classification used by the write retry path.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SqlxError {
    fn is_retryable(&self) -> bool {
        match self {
            SqlxError::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::BrokenPipe
                    | ErrorKind::TimedOut
                    | ErrorKind::NotConnected
            ),
            SqlxError::Tls(_) => true,
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::WorkerCrashed => true,
            // Constraint violations, decode failures and data-too-large are
            // permanent.
            _ => false,
        }
    }
}

impl IsRetryable for HavenError {
    fn is_retryable(&self) -> bool {
        match self {
            HavenError::Database(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for HavenError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            HavenError::Unauthorized => (
                StatusCode::FORBIDDEN,
                ApiErrorBody::new("UNAUTHORIZED", "Credential validation failed."),
            ),
            HavenError::NotFound => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", "No stored data for this account."),
            ),
            HavenError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody::new("RATE_LIMITED", "Save interval not elapsed; retry later."),
            ),
            HavenError::QuotaExceeded { limit, required } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ApiErrorBody::new("QUOTA_EXCEEDED", "Storage limit exceeded.")
                    .with_sizes(limit, required),
            ),
            HavenError::PayloadTooLarge { limit, size, .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ApiErrorBody::new("PAYLOAD_TOO_LARGE", "Payload exceeds the hard size limit.")
                    .with_sizes(limit, size),
            ),
            HavenError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("BAD_REQUEST", format!("Missing {field} in request.")),
            ),
            HavenError::Json(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("BAD_REQUEST", "Invalid request body."),
            ),
            // Authority trouble is 500, never 403: "we could not check" must
            // stay distinguishable from "credential is wrong".
            HavenError::Reqwest(_)
            | HavenError::AuthorityStatus(_)
            | HavenError::UrlParse(_)
            | HavenError::Database(_)
            | HavenError::Codec(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
            ),
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u64>,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            limit: None,
            required: None,
        }
    }

    fn with_sizes(mut self, limit: u64, required: u64) -> Self {
        self.limit = Some(limit);
        self.required = Some(required);
        self
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_connection_faults_are_retryable() {
        let reset = SqlxError::Io(std::io::Error::from(ErrorKind::ConnectionReset));
        let pipe = SqlxError::Io(std::io::Error::from(ErrorKind::BrokenPipe));
        let timeout = SqlxError::Io(std::io::Error::from(ErrorKind::TimedOut));
        assert!(reset.is_retryable());
        assert!(pipe.is_retryable());
        assert!(timeout.is_retryable());
        assert!(SqlxError::PoolTimedOut.is_retryable());
    }

    #[test]
    fn logic_errors_are_permanent() {
        assert!(!SqlxError::RowNotFound.is_retryable());
        let decode = SqlxError::Decode("bad column".into());
        assert!(!decode.is_retryable());
        assert!(!HavenError::Unauthorized.is_retryable());
    }

    #[test]
    fn transient_database_error_is_retryable_through_haven_error() {
        let err: HavenError =
            SqlxError::Io(std::io::Error::from(ErrorKind::ConnectionRefused)).into();
        assert!(err.is_retryable());
    }
}
