//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality (CORS policy and
//! response building), decoupled from the conversion logic.

pub mod cors;
pub mod response;

// Re-export commonly used types
pub use cors::CorsPolicy;
pub use response::{build_response, ensure_json_content_type, json_bytes};
