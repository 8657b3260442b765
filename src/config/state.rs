// Application state module
// Holds read-only configuration and the conversion engine shared by all requests

use std::sync::Arc;

use super::types::Config;
use crate::convert::Converter;
use crate::http::CorsPolicy;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Conversion engine shared by every request
    pub converter: Arc<dyn Converter>,
    /// CORS headers derived from `http.project_header`
    pub cors: CorsPolicy,
}

impl AppState {
    pub fn new(config: &Config, converter: Arc<dyn Converter>) -> Self {
        Self {
            cors: CorsPolicy::new(&config.http.project_header),
            config: config.clone(),
            converter,
        }
    }
}
