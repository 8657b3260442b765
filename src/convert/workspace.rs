//! Scoped temporary files for one conversion
//!
//! Both files are deleted when the workspace is removed or dropped,
//! whichever comes first, so every exit path releases them.

use std::io::{self, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use super::engine::ConvertError;

const FILE_PREFIX: &str = "pdf2docx-";
pub const INPUT_SUFFIX: &str = ".pdf";
pub const OUTPUT_SUFFIX: &str = ".docx";

/// Source and destination files for a single conversion
pub struct TempWorkspace {
    input: NamedTempFile,
    output: NamedTempFile,
}

impl TempWorkspace {
    /// Write `payload` to a fresh `.pdf` file and reserve an empty `.docx` file,
    /// both in `dir` (system temp dir when `None`)
    pub fn create(dir: Option<&Path>, payload: &[u8]) -> Result<Self, ConvertError> {
        let mut input = new_file(dir, INPUT_SUFFIX)
            .map_err(|e| ConvertError::io("failed to create temporary PDF file", e))?;
        input
            .write_all(payload)
            .and_then(|()| input.flush())
            .map_err(|e| ConvertError::io("failed to write temporary PDF file", e))?;

        // `input` is dropped (and deleted) if this fails
        let output = new_file(dir, OUTPUT_SUFFIX)
            .map_err(|e| ConvertError::io("failed to create temporary DOCX file", e))?;

        Ok(Self { input, output })
    }

    pub fn input_path(&self) -> &Path {
        self.input.path()
    }

    pub fn output_path(&self) -> &Path {
        self.output.path()
    }

    /// Read the converted document in full
    pub fn read_output(&self) -> Result<Vec<u8>, ConvertError> {
        std::fs::read(self.output.path())
            .map_err(|e| ConvertError::io("failed to read converted document", e))
    }

    /// Delete both files, reporting the first failure
    pub fn remove(self) -> io::Result<()> {
        let input = self.input.close();
        let output = self.output.close();
        input.and(output)
    }
}

fn new_file(dir: Option<&Path>, suffix: &str) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(FILE_PREFIX).suffix(suffix);
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}
