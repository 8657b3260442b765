//! PDF payload extraction
//!
//! The content type is classified once, then exactly one decoder runs:
//! raw PDF bytes, or a JSON object with a base64 `pdf_data` field.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::body::Bytes;
use serde_json::Value;
use thiserror::Error;

use super::request::RequestBody;

/// JSON field holding the base64-encoded document
pub const PDF_DATA_FIELD: &str = "pdf_data";

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Wire encoding of the document, resolved from Content-Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    RawPdf,
    JsonBase64,
    Unrecognized,
}

/// Classify a lowercased Content-Type header value
pub fn classify(content_type: &str) -> ContentKind {
    if content_type.contains("application/pdf") {
        ContentKind::RawPdf
    } else if content_type.contains("application/json") {
        ContentKind::JsonBase64
    } else {
        ContentKind::Unrecognized
    }
}

/// A complete PDF document extracted from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPayload(Bytes);

impl PdfPayload {
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the document opens with the `%PDF-` header
    pub fn has_pdf_signature(&self) -> bool {
        self.0.starts_with(PDF_SIGNATURE)
    }
}

/// Reasons a request body yields no usable payload
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No PDF data found. Check content-type and data format.")]
    NoPdfData,

    #[error("Missing pdf_data field")]
    MissingField,

    #[error("request body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON body must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("pdf_data must be a base64 string, got {0}")]
    FieldNotString(&'static str),

    #[error("invalid base64 in pdf_data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("character {ch:?} at position {position} cannot be encoded as a single byte")]
    NotSingleByte { ch: char, position: usize },

    #[error("payload is not a PDF document")]
    NotPdf,
}

/// Extract the document for the given content kind
pub fn extract(kind: ContentKind, body: &RequestBody) -> Result<PdfPayload, ExtractError> {
    let bytes = match kind {
        ContentKind::RawPdf => decode_raw(body)?,
        ContentKind::JsonBase64 => decode_json(body)?,
        ContentKind::Unrecognized => Bytes::new(),
    };

    if bytes.is_empty() {
        return Err(ExtractError::NoPdfData);
    }
    Ok(PdfPayload(bytes))
}

/// Raw document bytes; text bodies are re-encoded one byte per character
fn decode_raw(body: &RequestBody) -> Result<Bytes, ExtractError> {
    match body {
        RequestBody::Binary(bytes) => Ok(bytes.clone()),
        RequestBody::Text(text) => latin1_bytes(text).map(Bytes::from),
        RequestBody::Parsed(_) => Ok(Bytes::new()),
    }
}

/// `{"pdf_data": "<base64>"}`, parsed here unless the platform already did
fn decode_json(body: &RequestBody) -> Result<Bytes, ExtractError> {
    let parsed;
    let value = match body {
        RequestBody::Parsed(value) => value,
        RequestBody::Text(text) => {
            parsed = serde_json::from_str::<Value>(text)?;
            &parsed
        }
        RequestBody::Binary(bytes) => {
            let text = std::str::from_utf8(bytes)?;
            parsed = serde_json::from_str::<Value>(text)?;
            &parsed
        }
    };

    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::NotAnObject(json_type(value)))?;
    let field = object
        .get(PDF_DATA_FIELD)
        .ok_or(ExtractError::MissingField)?;
    let encoded = field
        .as_str()
        .ok_or_else(|| ExtractError::FieldNotString(json_type(field)))?;

    decode_base64(encoded).map(Bytes::from)
}

/// Standard base64, tolerating line breaks and a `data:` URL prefix
fn decode_base64(encoded: &str) -> Result<Vec<u8>, ExtractError> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

fn latin1_bytes(text: &str) -> Result<Vec<u8>, ExtractError> {
    text.chars()
        .enumerate()
        .map(|(position, ch)| {
            u8::try_from(u32::from(ch)).map_err(|_| ExtractError::NotSingleByte { ch, position })
        })
        .collect()
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
