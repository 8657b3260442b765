//! HTTP response building module
//!
//! Turns status, headers and body bytes into a hyper response, decoupled
//! from the conversion logic that decided them.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, SERVER};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::logger;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build a response from already-merged headers
pub fn build_response(
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    server_name: &str,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    if let Ok(server) = HeaderValue::from_str(server_name) {
        builder = builder.header(SERVER, server);
    }
    if let Some(map) = builder.headers_mut() {
        map.extend(headers);
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        let mut fallback = Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Serialize a JSON body, falling back to a fixed error document
pub fn json_bytes<T: Serialize>(body: &T) -> Bytes {
    match serde_json::to_vec(body) {
        Ok(json) => Bytes::from(json),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            Bytes::from_static(br#"{"error":"Internal server error"}"#)
        }
    }
}

/// Set `Content-Type: application/json` unless the branch chose its own
pub fn ensure_json_content_type(headers: &mut HeaderMap) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert_with(|| HeaderValue::from_static(JSON_CONTENT_TYPE));
}

/// Log response build error
fn log_build_error(response_type: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {response_type} response: {error}"));
}
