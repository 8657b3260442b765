//! Conversion engine module
//!
//! Wraps the external PDF to DOCX engine behind the [`Converter`] trait and
//! manages the temporary files each conversion needs.

mod command;
mod engine;
mod workspace;

use std::path::Path;
use std::sync::Arc;

pub use engine::{ConvertError, Converter, PageRange};

use command::CommandConverter;
use workspace::TempWorkspace;

use crate::config::ConverterConfig;
use crate::logger;

/// Build the engine selected by configuration
pub fn from_config(config: &ConverterConfig) -> Arc<dyn Converter> {
    Arc::new(CommandConverter::from_config(config))
}

/// Run one conversion end to end on the calling thread
///
/// Writes `payload` into a fresh workspace, invokes the engine over `range`
/// and returns the converted bytes. The workspace is removed on every path.
pub fn convert_bytes(
    converter: &dyn Converter,
    temp_dir: Option<&Path>,
    payload: &[u8],
    range: PageRange,
) -> Result<Vec<u8>, ConvertError> {
    let workspace = TempWorkspace::create(temp_dir, payload)?;

    let converted = converter
        .convert(workspace.input_path(), workspace.output_path(), range)
        .and_then(|()| workspace.read_output());

    match converted {
        Ok(bytes) => {
            if let Err(e) = workspace.remove() {
                logger::log_warning(&format!("Failed to remove temporary files: {e}"));
            }
            if bytes.is_empty() {
                return Err(ConvertError::EmptyOutput);
            }
            Ok(bytes)
        }
        Err(e) => {
            // Cleanup errors must not mask the conversion error
            let _ = workspace.remove();
            Err(e)
        }
    }
}
