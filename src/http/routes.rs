//! Which paths get which treatment.

use crate::config::GuardConfig;

/// Path classification for the route-level stages of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    pub protected_prefixes: Vec<String>,
    pub public_paths: Vec<String>,
    pub sensitive_paths: Vec<String>,
    pub trust_forwarded_for: bool,
}

impl RoutePolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            protected_prefixes: config.auth.protected_prefixes.clone(),
            public_paths: config.auth.public_paths.clone(),
            sensitive_paths: if config.route_rate_limit.enabled {
                config.route_rate_limit.paths.clone()
            } else {
                Vec::new()
            },
            trust_forwarded_for: config.listener.trust_forwarded_for,
        }
    }

    /// Requires a bearer token: under a protected prefix and not public.
    pub fn is_protected(&self, path: &str) -> bool {
        if self.public_paths.iter().any(|p| p == path) {
            return false;
        }
        self.protected_prefixes
            .iter()
            .any(|prefix| has_segment_prefix(path, prefix))
    }

    /// Guarded by the per-route rate limiter.
    pub fn is_sensitive(&self, path: &str) -> bool {
        self.sensitive_paths.iter().any(|p| p == path)
    }
}

/// `prefix` matches whole path segments: `/api` covers `/api/x` but not `/apiary`.
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let policy = RoutePolicy::from_config(&GuardConfig::default());

        assert!(policy.is_protected("/api"));
        assert!(policy.is_protected("/api/stories/1"));
        assert!(!policy.is_protected("/apiary"));
        assert!(!policy.is_protected("/api/auth/login"));
        assert!(!policy.is_protected("/health"));

        assert!(policy.is_sensitive("/api/auth/login"));
        assert!(!policy.is_sensitive("/api/auth/login/extra"));
    }

    #[test]
    fn test_root_prefix_protects_everything() {
        let policy = RoutePolicy {
            protected_prefixes: vec!["/".into()],
            ..RoutePolicy::default()
        };
        assert!(policy.is_protected("/anything"));
    }

    #[test]
    fn test_disabled_route_limiter_has_no_sensitive_paths() {
        let mut config = GuardConfig::default();
        config.route_rate_limit.enabled = false;
        assert!(!RoutePolicy::from_config(&config).is_sensitive("/api/auth/login"));
    }
}
