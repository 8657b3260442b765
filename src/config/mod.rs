// Configuration module entry point
// Manages application configuration and the per-process runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, ConverterConfig};

use crate::logger::LogLevel;

/// Default config file (without extension) when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable prefix, e.g. `PDF2DOCX_SERVER__PORT=9000`
const ENV_PREFIX: &str = "PDF2DOCX";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// The file is optional; environment variables override file values
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("converter.args"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.shutdown_timeout", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 300)?
            .set_default("performance.write_timeout", 300)?
            .set_default("http.server_name", "pdf2docx-function")?
            .set_default("http.max_body_size", 52_428_800)? // 50MB
            .set_default("http.project_header", "X-Appwrite-Project")?
            .set_default("http.verify_pdf_signature", false)?
            .set_default("converter.program", "pdf2docx")?
            .set_default("converter.args", vec!["convert", "{input}", "{output}"])?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate().map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    /// Reject values that deserialize fine but cannot run
    pub fn validate(&self) -> Result<(), String> {
        self.get_socket_addr()?;
        self.logging.level.parse::<LogLevel>()?;

        if self.converter.program.trim().is_empty() {
            return Err("converter.program must not be empty".to_string());
        }
        for placeholder in ["{input}", "{output}"] {
            if !self.converter.args.iter().any(|a| a.contains(placeholder)) {
                return Err(format!("converter.args must reference {placeholder}"));
            }
        }
        if self.http.project_header.trim().is_empty() {
            return Err("http.project_header must not be empty".to_string());
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
