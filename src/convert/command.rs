//! External converter process
//!
//! Runs a converter program such as the `pdf2docx` CLI:
//! `pdf2docx convert <input> <output> [--start=N] [--end=N]`.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use super::engine::{ConvertError, Converter, PageRange};
use crate::config::ConverterConfig;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Converter backed by an external program
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    description: String,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let description = format!("{program} {}", args.join(" "));
        Self {
            program,
            args,
            description,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Expand the argument template for one conversion
    fn build_args(&self, input: &Path, output: &Path, range: PageRange) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .args
            .iter()
            .map(|arg| match arg.as_str() {
                INPUT_PLACEHOLDER => input.as_os_str().to_owned(),
                OUTPUT_PLACEHOLDER => output.as_os_str().to_owned(),
                other => OsString::from(
                    other
                        .replace(INPUT_PLACEHOLDER, &input.to_string_lossy())
                        .replace(OUTPUT_PLACEHOLDER, &output.to_string_lossy()),
                ),
            })
            .collect();

        if range.is_full() {
            return args;
        }
        if range.start > 0 {
            args.push(format!("--start={}", range.start).into());
        }
        if let Some(end) = range.end {
            args.push(format!("--end={end}").into());
        }
        args
    }
}

impl Converter for CommandConverter {
    fn convert(&self, input: &Path, output: &Path, range: PageRange) -> Result<(), ConvertError> {
        let result = Command::new(&self.program)
            .args(self.build_args(input, output, range))
            .output()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let reason = stderr.trim();
        if reason.is_empty() {
            Err(ConvertError::Failed(format!(
                "{} exited with {}",
                self.program, result.status
            )))
        } else {
            Err(ConvertError::Failed(reason.to_string()))
        }
    }

    fn name(&self) -> &str {
        &self.description
    }
}
