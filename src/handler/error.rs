//! Handler error taxonomy
//!
//! Each phase returns its own error; only here do they become a status code
//! and the `{"error": "..."}` message sent on the wire.

use hyper::StatusCode;
use thiserror::Error;

use super::payload::ExtractError;
use crate::convert::ConvertError;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Anything other than POST or OPTIONS
    #[error("Only POST requests allowed")]
    MethodNotAllowed,

    /// Body exceeded `http.max_body_size`
    #[error("Request body too large")]
    PayloadTooLarge,

    /// No usable payload in the body
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Body could not be read off the connection
    #[error("{0}")]
    BodyRead(String),

    /// Temp file I/O or engine failure
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// Anything not covered above, including panics in the handler task
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Extract(_) | Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::Conversion(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the JSON `error` field
    pub fn message(&self) -> String {
        match self {
            Self::Extract(ExtractError::MissingField | ExtractError::NoPdfData)
            | Self::MethodNotAllowed
            | Self::PayloadTooLarge => self.to_string(),
            Self::Extract(_) | Self::BodyRead(_) => format!("Failed to process PDF data: {self}"),
            Self::Conversion(e) => format!("Conversion failed: {e}"),
            Self::Internal(e) => format!("Request processing failed: {e}"),
        }
    }
}
