//! hyper service entry point
//!
//! Reads the body off the connection, hands an [`IncomingRequest`] to the
//! conversion function on its own task, and writes the access log.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::error::HandlerError;
use super::function::ConversionFunction;
use super::request::{IncomingRequest, RequestBody};
use super::response::OutgoingResponse;
use crate::config::AppState;
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let function = ConversionFunction::from_state(&state);

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.http_version = format_version(req.version());
    entry.content_type = header_string(&req, CONTENT_TYPE);
    entry.user_agent = header_string(&req, USER_AGENT);

    let response = match read_request(req, state.config.http.max_body_size).await {
        Ok(incoming) => {
            entry.request_bytes = incoming.body.len();
            run_isolated(&function, incoming).await
        }
        Err(err) => function.error_response(&err),
    };

    entry.status = response.status.as_u16();
    let response = response.into_hyper(&state.config.http.server_name);
    entry.body_bytes = body_len(&response);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    if state.config.logging.access_log {
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Run the function on its own task so a panic becomes a 500, not a dropped connection
async fn run_isolated(function: &ConversionFunction, incoming: IncomingRequest) -> OutgoingResponse {
    let task_function = function.clone();
    match tokio::spawn(async move { task_function.handle(incoming).await }).await {
        Ok(response) => response,
        Err(e) => function.error_response(&HandlerError::Internal(e.to_string())),
    }
}

/// Collect the body for POST requests only; other methods never inspect it
async fn read_request<B>(req: Request<B>, max_body_size: u64) -> Result<IncomingRequest, HandlerError>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    if parts.method != Method::POST {
        return Ok(IncomingRequest::new(
            parts.method,
            parts.headers,
            RequestBody::Binary(Bytes::new()),
        ));
    }

    if let Some(declared) = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if declared > max_body_size {
            logger::log_warning(&format!(
                "Request body too large: {declared} bytes (max: {max_body_size})"
            ));
            return Err(HandlerError::PayloadTooLarge);
        }
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            HandlerError::PayloadTooLarge
        } else {
            HandlerError::BodyRead(e.to_string())
        }
    })?;

    Ok(IncomingRequest::new(
        parts.method,
        parts.headers,
        RequestBody::Binary(collected.to_bytes()),
    ))
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn format_version(version: hyper::Version) -> String {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string()
}

fn body_len(response: &Response<Full<Bytes>>) -> usize {
    use hyper::body::Body;
    response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}
