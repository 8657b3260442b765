//! Incoming request model
//!
//! Platforms deliver the body in different shapes; the handler sees them
//! all through [`RequestBody`] and must handle each one.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::Method;

/// Request body as delivered by the platform
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Raw bytes
    Binary(Bytes),
    /// Text the platform already decoded
    Text(String),
    /// JSON the platform already parsed
    Parsed(serde_json::Value),
}

impl RequestBody {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
            Self::Parsed(value) => value.to_string().len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Binary(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
            Self::Parsed(_) => false,
        }
    }
}

/// One request handed to the conversion function
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Header lookup is case-insensitive
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl IncomingRequest {
    pub fn new(method: Method, headers: HeaderMap, body: RequestBody) -> Self {
        Self {
            method,
            headers,
            body,
        }
    }

    /// Lowercased Content-Type, empty when absent or not visible ASCII
    pub fn content_type(&self) -> String {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}
