use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// An ignore route could not be compiled into a matcher.
    #[error("invalid ignore route pattern '{pattern}': {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The inbound request body could not be read while buffering it for the log record.
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::RequestBody(ref e) => {
                warn!(error = %e, "Rejecting request with unreadable body");
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Error::InvalidIgnorePattern { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
