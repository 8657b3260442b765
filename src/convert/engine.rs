//! Conversion engine seam
//!
//! The engine is opaque: given a source PDF path and a destination DOCX
//! path it either fills the destination or reports why it could not.

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Pages to convert; `start` is inclusive and 0-based, `end` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl PageRange {
    /// The whole document
    pub const FULL: Self = Self {
        start: 0,
        end: None,
    };

    pub const fn is_full(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..{end}", self.start),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// Failures reported by a conversion engine
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter program could not be started
    #[error("failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and reported failure
    #[error("{0}")]
    Failed(String),

    /// The engine reported success but produced no document
    #[error("converter produced an empty document")]
    EmptyOutput,

    /// Temporary file I/O around the engine call
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub const fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// A PDF to DOCX conversion engine
///
/// Implementations are called from tokio's blocking pool and may block.
pub trait Converter: Send + Sync {
    /// Convert `input` into `output`, overwriting whatever `output` holds
    fn convert(&self, input: &Path, output: &Path, range: PageRange) -> Result<(), ConvertError>;

    /// Short description for startup and error logs
    fn name(&self) -> &str;
}
