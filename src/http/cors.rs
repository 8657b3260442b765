//! CORS header policy
//!
//! Every response carries the same three core headers; preflight responses
//! add a max-age so browsers cache the result.

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
/// Preflight cache duration in seconds
pub const PREFLIGHT_MAX_AGE: &str = "86400";

const BASE_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// CORS headers applied to every response
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    /// Build the policy, allow-listing the platform's project-identifier header
    pub fn new(project_header: &str) -> Self {
        let project_header = project_header.trim();
        let allow_headers = if project_header.is_empty() {
            HeaderValue::from_static(BASE_ALLOW_HEADERS)
        } else {
            HeaderValue::from_str(&format!("{BASE_ALLOW_HEADERS}, {project_header}"))
                .unwrap_or_else(|_| HeaderValue::from_static(BASE_ALLOW_HEADERS))
        };
        Self { allow_headers }
    }

    /// The CORS header set, before branch-specific headers are merged in
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers
    }

    /// Merge `branch` over the CORS headers; branch values win on conflict
    pub fn apply(&self, branch: HeaderMap) -> HeaderMap {
        let mut headers = self.headers();
        headers.extend(branch);
        headers
    }
}
