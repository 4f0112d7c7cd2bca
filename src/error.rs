//! Unified error type.
//!
//! Two kinds of failure flow through a request:
//!
//! - **Trusted errors** ([`Error::Status`]) carry an HTTP status and a
//!   user-facing message. They are intentional ("403 forbidden") and are
//!   sent to the client verbatim as `{"status": <int>, "message": <string>}`.
//! - **Internal errors** ([`Error::Internal`]) wrap anything else. The
//!   client sees a generic `500 Internal Server Error`; the original detail
//!   is logged, never sent over the wire.

use thiserror::Error as ThisError;

/// The error type returned by handlers, middleware, and the server itself.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A trusted, intentional failure with a status and user-facing message.
    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    /// Any other failure. Collapsed to a generic 500 at the response
    /// boundary; the wrapped detail is only ever logged.
    #[error("{0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// A trusted error: `status` and `message` are sent to the client as-is.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Wraps an arbitrary error. The client will only see a generic 500.
    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(err.into())
    }
}

/// Shorthand for [`Error::status`]: `return Err(err(403, "begone"))`.
pub fn err(status: u16, message: impl Into<String>) -> Error {
    Error::status(status, message)
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}
