//! Outgoing response model

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    CONTENT_DISPOSITION, CONTENT_TYPE,
};
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::error::HandlerError;
use crate::http::{self, cors, CorsPolicy};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOCX_DISPOSITION: &str = "attachment; filename=\"converted.docx\"";

/// `{"error": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(serde_json::Value),
    Binary(Bytes),
}

/// Response produced by the conversion function, CORS already applied
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl OutgoingResponse {
    fn new(status: StatusCode, branch: HeaderMap, body: ResponseBody, cors: &CorsPolicy) -> Self {
        Self {
            status,
            headers: cors.apply(branch),
            body,
        }
    }

    /// Empty 200 answering a CORS preflight
    pub fn preflight(cors: &CorsPolicy) -> Self {
        let mut branch = HeaderMap::new();
        branch.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(cors::PREFLIGHT_MAX_AGE),
        );
        Self::new(StatusCode::OK, branch, ResponseBody::Empty, cors)
    }

    /// 200 with the converted document as an attachment
    pub fn docx(document: Bytes, cors: &CorsPolicy) -> Self {
        let mut branch = HeaderMap::new();
        branch.insert(CONTENT_TYPE, HeaderValue::from_static(DOCX_CONTENT_TYPE));
        branch.insert(CONTENT_DISPOSITION, HeaderValue::from_static(DOCX_DISPOSITION));
        branch.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Content-Disposition"),
        );
        Self::new(StatusCode::OK, branch, ResponseBody::Binary(document), cors)
    }

    /// JSON error body with the error's status
    pub fn error(err: &HandlerError, cors: &CorsPolicy) -> Self {
        let body = ErrorBody {
            error: err.message(),
        };
        let mut branch = HeaderMap::new();
        http::ensure_json_content_type(&mut branch);
        let value = serde_json::to_value(&body)
            .unwrap_or_else(|_| serde_json::json!({ "error": body.error }));
        Self::new(err.status(), branch, ResponseBody::Json(value), cors)
    }

    /// The JSON `error` message, if this is an error response
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Json(value) => value.get("error").and_then(serde_json::Value::as_str),
            ResponseBody::Empty | ResponseBody::Binary(_) => None,
        }
    }

    /// Serialize the body and hand the response to hyper
    pub fn into_hyper(self, server_name: &str) -> Response<Full<Bytes>> {
        let Self {
            status,
            mut headers,
            body,
        } = self;
        let bytes = match body {
            ResponseBody::Empty => Bytes::new(),
            ResponseBody::Binary(bytes) => bytes,
            ResponseBody::Json(value) => {
                http::ensure_json_content_type(&mut headers);
                http::json_bytes(&value)
            }
        };
        http::build_response(status, headers, bytes, server_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::payload::ExtractError;
    use http_body_util::BodyExt;
    use hyper::header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    };

    fn cors() -> CorsPolicy {
        CorsPolicy::new("X-Appwrite-Project")
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert!(headers.contains_key(ACCESS_CONTROL_ALLOW_HEADERS));
    }

    #[test]
    fn test_preflight() {
        let resp = OutgoingResponse::preflight(&cors());
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, ResponseBody::Empty);
        assert_eq!(resp.headers[ACCESS_CONTROL_MAX_AGE], "86400");
        assert_cors(&resp.headers);
    }

    #[test]
    fn test_docx_headers() {
        let resp = OutgoingResponse::docx(Bytes::from_static(b"PK\x03\x04"), &cors());
        assert_eq!(resp.headers[CONTENT_TYPE], DOCX_CONTENT_TYPE);
        assert_eq!(
            resp.headers[CONTENT_DISPOSITION],
            "attachment; filename=\"converted.docx\""
        );
        assert_eq!(resp.headers[ACCESS_CONTROL_EXPOSE_HEADERS], "Content-Disposition");
        assert_cors(&resp.headers);
        assert!(resp.error_message().is_none());
    }

    #[test]
    fn test_error_body() {
        let resp = OutgoingResponse::error(&ExtractError::MissingField.into(), &cors());
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), Some("Missing pdf_data field"));
        assert_eq!(resp.headers[CONTENT_TYPE], "application/json");
        assert_cors(&resp.headers);
    }

    #[tokio::test]
    async fn test_into_hyper_serializes_json() {
        let resp = OutgoingResponse::error(&HandlerError::MethodNotAllowed, &cors())
            .into_hyper("pdf2docx-function");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors(resp.headers());

        let body = resp.into_body().collect().await.expect("full body").to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value, serde_json::json!({"error": "Only POST requests allowed"}));
    }
}
