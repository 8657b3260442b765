//! The conversion function
//!
//! `handle(request) -> response` in three straight-line phases:
//! input extraction, conversion, response formatting. Every failure
//! becomes a JSON error response; nothing escapes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Bytes;
use hyper::Method;

use super::error::HandlerError;
use super::payload::{self, PdfPayload};
use super::request::IncomingRequest;
use super::response::OutgoingResponse;
use crate::config::AppState;
use crate::convert::{self, Converter, PageRange};
use crate::http::CorsPolicy;
use crate::logger;

/// Everything one invocation needs; cheap to clone into a task
#[derive(Clone)]
pub struct ConversionFunction {
    converter: Arc<dyn Converter>,
    cors: CorsPolicy,
    temp_dir: Option<PathBuf>,
    verify_pdf_signature: bool,
}

impl ConversionFunction {
    pub fn new(converter: Arc<dyn Converter>, cors: CorsPolicy) -> Self {
        Self {
            converter,
            cors,
            temp_dir: None,
            verify_pdf_signature: false,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(Arc::clone(&state.converter), state.cors.clone())
            .with_temp_dir(state.config.converter.temp_dir.clone().map(PathBuf::from))
            .with_signature_check(state.config.http.verify_pdf_signature)
    }

    /// Create temporary files in `dir` instead of the system temp dir
    #[must_use]
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    #[must_use]
    pub const fn with_signature_check(mut self, enabled: bool) -> Self {
        self.verify_pdf_signature = enabled;
        self
    }

    /// Handle one request; always produces exactly one response
    pub async fn handle(&self, request: IncomingRequest) -> OutgoingResponse {
        match self.process(request).await {
            Ok(response) => response,
            Err(err) => self.error_response(&err),
        }
    }

    /// JSON error response for `err`, logged at a level matching its status
    pub fn error_response(&self, err: &HandlerError) -> OutgoingResponse {
        let response = OutgoingResponse::error(err, &self.cors);
        let message = response.error_message().unwrap_or_default();
        if response.status.is_server_error() {
            logger::log_error(message);
        } else {
            logger::log_warning(message);
        }
        response
    }

    async fn process(&self, request: IncomingRequest) -> Result<OutgoingResponse, HandlerError> {
        if request.method == Method::OPTIONS {
            return Ok(OutgoingResponse::preflight(&self.cors));
        }
        if request.method != Method::POST {
            return Err(HandlerError::MethodNotAllowed);
        }

        let payload = self.extract(&request)?;
        let document = self.convert(payload).await?;
        Ok(OutgoingResponse::docx(document, &self.cors))
    }

    /// Phase (a): pull the PDF bytes out of whichever encoding was sent
    fn extract(&self, request: &IncomingRequest) -> Result<PdfPayload, HandlerError> {
        let content_type = request.content_type();
        logger::log_debug(&format!("Content-Type: {content_type}"));

        let kind = payload::classify(&content_type);
        let pdf = payload::extract(kind, &request.body)?;
        logger::log_debug(&format!("Extracted {:?} payload, size: {} bytes", kind, pdf.len()));

        if self.verify_pdf_signature && !pdf.has_pdf_signature() {
            return Err(payload::ExtractError::NotPdf.into());
        }
        Ok(pdf)
    }

    /// Phase (b): run the engine on the blocking pool
    async fn convert(&self, pdf: PdfPayload) -> Result<Bytes, HandlerError> {
        let converter = Arc::clone(&self.converter);
        let temp_dir = self.temp_dir.clone();
        let input_len = pdf.len();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            convert::convert_bytes(
                converter.as_ref(),
                temp_dir.as_deref(),
                pdf.bytes(),
                PageRange::FULL,
            )
        })
        .await
        .map_err(|e| HandlerError::Internal(format!("conversion task failed: {e}")))?;

        let document = result?;
        logger::log_info(&format!(
            "Converted {input_len} byte PDF into {} byte DOCX in {} ms",
            document.len(),
            started.elapsed().as_millis()
        ));
        Ok(Bytes::from(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertError;
    use crate::handler::request::RequestBody;
    use crate::handler::response::{ResponseBody, DOCX_CONTENT_TYPE};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hyper::header::{
        HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE,
    };
    use hyper::StatusCode;
    use std::path::Path;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF\n";
    const DOCX: &[u8] = b"PK\x03\x04word/document.xml";

    /// Writes a fixed DOCX body, after checking it was handed a PDF file
    struct FakeConverter;

    impl Converter for FakeConverter {
        fn convert(
            &self,
            input: &Path,
            output: &Path,
            range: PageRange,
        ) -> Result<(), ConvertError> {
            assert!(range.is_full());
            let source = std::fs::read(input).map_err(|e| ConvertError::io("read input", e))?;
            if !source.starts_with(b"%PDF-") {
                return Err(ConvertError::Failed("Failed to open document".to_string()));
            }
            std::fs::write(output, DOCX).map_err(|e| ConvertError::io("write output", e))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct PanickingConverter;

    impl Converter for PanickingConverter {
        fn convert(&self, _: &Path, _: &Path, _: PageRange) -> Result<(), ConvertError> {
            panic!("engine crashed");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn function(converter: Arc<dyn Converter>, dir: &Path) -> ConversionFunction {
        ConversionFunction::new(converter, CorsPolicy::new("X-Appwrite-Project"))
            .with_temp_dir(Some(dir.to_path_buf()))
    }

    fn request(method: Method, content_type: Option<&'static str>, body: RequestBody) -> IncomingRequest {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        IncomingRequest::new(method, headers, body)
    }

    fn pdf_request(body: &'static [u8]) -> IncomingRequest {
        request(
            Method::POST,
            Some("application/pdf"),
            RequestBody::Binary(Bytes::from_static(body)),
        )
    }

    fn assert_cors(resp: &OutgoingResponse) {
        assert_eq!(resp.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(
            resp.headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization, X-Appwrite-Project"
        );
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).expect("read temp dir").count()
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(request(Method::OPTIONS, None, RequestBody::Binary(Bytes::new())))
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, ResponseBody::Empty);
        assert_eq!(resp.headers[ACCESS_CONTROL_MAX_AGE], "86400");
        assert_cors(&resp);
    }

    #[tokio::test]
    async fn test_other_methods_rejected_before_body_inspection() {
        let dir = tempfile::tempdir().expect("temp dir");
        let f = function(Arc::new(FakeConverter), dir.path());
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            // A body that would fail extraction proves the gate runs first
            let resp = f
                .handle(request(
                    method,
                    Some("application/json"),
                    RequestBody::Text("{broken".to_string()),
                ))
                .await;
            assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(resp.error_message(), Some("Only POST requests allowed"));
            assert_cors(&resp);
        }
    }

    #[tokio::test]
    async fn test_raw_pdf_converts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(pdf_request(PDF))
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers[CONTENT_TYPE], DOCX_CONTENT_TYPE);
        assert_eq!(resp.body, ResponseBody::Binary(Bytes::from_static(DOCX)));
        assert_cors(&resp);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_json_base64_converts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let body = serde_json::json!({ "pdf_data": STANDARD.encode(PDF) });
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(request(
                Method::POST,
                Some("application/json"),
                RequestBody::Parsed(body),
            ))
            .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, ResponseBody::Binary(Bytes::from_static(DOCX)));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_json_missing_field() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(request(
                Method::POST,
                Some("application/json"),
                RequestBody::Text("{}".to_string()),
            ))
            .await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), Some("Missing pdf_data field"));
        assert_cors(&resp);
    }

    #[tokio::test]
    async fn test_empty_pdf_body() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(pdf_request(b""))
            .await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp
            .error_message()
            .is_some_and(|m| m.starts_with("No PDF data found")));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_content_type() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(request(
                Method::POST,
                Some("text/plain"),
                RequestBody::Binary(Bytes::from_static(PDF)),
            ))
            .await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp
            .error_message()
            .is_some_and(|m| m.starts_with("No PDF data found")));
    }

    #[tokio::test]
    async fn test_bad_base64_is_a_400() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(request(
                Method::POST,
                Some("application/json"),
                RequestBody::Text(r#"{"pdf_data": "not base64!"}"#.to_string()),
            ))
            .await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp
            .error_message()
            .is_some_and(|m| m.starts_with("Failed to process PDF data: ")));
    }

    #[tokio::test]
    async fn test_engine_failure_is_a_500_and_cleans_up() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .handle(pdf_request(b"this is not a pdf"))
            .await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.error_message(),
            Some("Conversion failed: Failed to open document")
        );
        assert_cors(&resp);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_engine_panic_is_caught() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(PanickingConverter), dir.path())
            .handle(pdf_request(PDF))
            .await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp
            .error_message()
            .is_some_and(|m| m.starts_with("Request processing failed: ")));
        assert_cors(&resp);
        // Unwinding drops the workspace, which deletes both files
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_signature_check() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resp = function(Arc::new(FakeConverter), dir.path())
            .with_signature_check(true)
            .handle(pdf_request(b"PK\x03\x04 not a pdf"))
            .await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.error_message(),
            Some("Failed to process PDF data: payload is not a PDF document")
        );
    }

    #[tokio::test]
    async fn test_signature_check_requires_leading_header() {
        let dir = tempfile::tempdir().expect("temp dir");
        let f = function(Arc::new(FakeConverter), dir.path()).with_signature_check(true);

        let embedded = f.handle(pdf_request(b"PK\x03\x04zip...%PDF-1.7")).await;
        assert_eq!(embedded.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            embedded.error_message(),
            Some("Failed to process PDF data: payload is not a PDF document")
        );
        assert_cors(&embedded);

        let leading = f.handle(pdf_request(PDF)).await;
        assert_eq!(leading.status, StatusCode::OK);
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_same_pdf_twice() {
        let dir = tempfile::tempdir().expect("temp dir");
        let f = function(Arc::new(FakeConverter), dir.path());
        let first = f.handle(pdf_request(PDF)).await;
        let second = f.handle(pdf_request(PDF)).await;

        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(leftover_files(dir.path()), 0);
    }
}
