//! Request content policy: media type and size.

use axum::http::Method;

use crate::config::WafConfig;

/// Content-type and size limits checked by the request gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPolicy {
    pub max_body_bytes: u64,
    pub require_json_for_writes: bool,
}

impl ContentPolicy {
    pub fn from_config(config: &WafConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            require_json_for_writes: config.require_json_for_writes,
        }
    }

    /// Methods that never carry state changes.
    pub fn is_read_method(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Whether the declared media type is acceptable for `method`.
    pub fn content_type_allowed(&self, method: &Method, content_type: Option<&str>) -> bool {
        if !self.require_json_for_writes || Self::is_read_method(method) {
            return true;
        }
        content_type.map(is_json_media_type).unwrap_or(false)
    }

    pub fn length_allowed(&self, declared: Option<u64>) -> bool {
        declared.map_or(true, |len| len <= self.max_body_bytes)
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self::from_config(&WafConfig::default())
    }
}

/// `application/json`, ignoring parameters and case.
fn is_json_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
