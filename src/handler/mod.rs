//! Request handler module
//!
//! The PDF to DOCX conversion function and the hyper service that feeds it.

pub mod error;
pub mod function;
pub mod payload;
pub mod request;
pub mod response;
pub mod service;

// Re-export main entry point
pub use service::handle_request;
