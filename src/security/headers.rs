//! Security response headers attached to accepted requests.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::SecurityHeadersConfig;

/// Pre-built header values; building once keeps the request path allocation-free.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    values: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityHeadersConfig) -> Result<Self, header::InvalidHeaderValue> {
        Ok(Self {
            values: vec![
                (
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_str(&config.content_security_policy)?,
                ),
                (
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_str(&config.strict_transport_security)?,
                ),
                (header::REFERRER_POLICY, HeaderValue::from_str(&config.referrer_policy)?),
                (
                    HeaderName::from_static("permissions-policy"),
                    HeaderValue::from_str(&config.permissions_policy)?,
                ),
            ],
        })
    }

    /// Set every security header, overwriting upstream values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.values {
            headers.insert(name.clone(), value.clone());
        }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::from_config(&SecurityHeadersConfig::default()).expect("built-in header values are valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("unsafe-url"));
        SecurityHeaders::default().apply(&mut headers);

        let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.starts_with("default-src 'self'"));
        assert!(csp.contains("object-src 'none'"));
        assert!(csp.contains("frame-ancestors 'none'"));
        assert_eq!(
            headers[header::STRICT_TRANSPORT_SECURITY],
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(
            headers["permissions-policy"],
            "camera=(), microphone=(), geolocation=(), payment=(), usb=()"
        );
    }

    #[test]
    fn test_invalid_value_rejected() {
        let config = SecurityHeadersConfig {
            referrer_policy: "bad\nvalue".into(),
            ..SecurityHeadersConfig::default()
        };
        assert!(SecurityHeaders::from_config(&config).is_err());
    }
}
