use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::token::DEFAULT_EXPIRY_BUFFER_MS;

/// Delay between the "session expired" notice and the redirect, so the
/// notice gets a chance to render.
const DEFAULT_REDIRECT_DELAY_MS: u64 = 1_500;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";
const DEFAULT_AUTH_ENDPOINT_MARKER: &str = "/auth/";

/// Routes whose forms handle a 401 themselves.
const DEFAULT_AUTH_PAGES: &[&str] = &[
    "/login",
    "/register",
    "/verify-otp",
    "/forgot-password",
    "/forgot-password-otp",
    "/reset-password",
    "/admin-login",
    "/admin-otp",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardMessages {
    pub session_expired: String,
    pub unauthorized: String,
    pub forbidden: String,
}

impl Default for GuardMessages {
    fn default() -> Self {
        Self {
            session_expired: "Your session has expired. Please log in again.".to_string(),
            unauthorized: "You have been signed out. Please log in again.".to_string(),
            forbidden: "You do not have permission to access this resource.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub expiry_buffer_ms: i64,
    pub redirect_delay_ms: u64,
    pub login_path: String,
    pub unauthorized_path: String,
    /// Requests whose path contains this are never blocked or decorated
    pub auth_endpoint_marker: String,
    pub auth_pages: Vec<String>,
    /// Reject requests client-side when no token is stored at all
    pub require_session: bool,
    pub messages: GuardMessages,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_ms: DEFAULT_EXPIRY_BUFFER_MS,
            redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            unauthorized_path: DEFAULT_UNAUTHORIZED_PATH.to_string(),
            auth_endpoint_marker: DEFAULT_AUTH_ENDPOINT_MARKER.to_string(),
            auth_pages: DEFAULT_AUTH_PAGES.iter().map(|p| p.to_string()).collect(),
            require_session: false,
            messages: GuardMessages::default(),
        }
    }
}

impl GuardConfig {
    /// Negative buffers are treated as zero
    pub fn expiry_buffer(&self) -> Duration {
        Duration::milliseconds(self.expiry_buffer_ms.max(0))
    }

    pub fn redirect_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn is_auth_endpoint(&self, request_path: &str) -> bool {
        !self.auth_endpoint_marker.is_empty() && request_path.contains(&self.auth_endpoint_marker)
    }

    /// Whether the route is part of the login/registration/reset flow.
    /// Query strings, fragments and a trailing slash are ignored.
    pub fn is_auth_page(&self, route: &str) -> bool {
        let route = normalize_route(route);
        self.auth_pages
            .iter()
            .any(|page| normalize_route(page) == route)
    }
}

fn normalize_route(route: &str) -> &str {
    let end = route.find(['?', '#']).unwrap_or(route.len());
    let route = route[..end].trim();
    match route.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let config = GuardConfig::default();
        for page in [
            "/login",
            "/register",
            "/verify-otp",
            "/forgot-password",
            "/forgot-password-otp",
            "/reset-password",
            "/admin-login",
            "/admin-otp",
        ] {
            assert!(config.is_auth_page(page), "{page} should be allowlisted");
        }
        assert!(!config.is_auth_page("/homepage"));
        assert!(!config.is_auth_page("/"));
        assert!(!config.is_auth_page("/login-history"));
    }

    #[test]
    fn test_auth_page_ignores_query_and_trailing_slash() {
        let config = GuardConfig::default();
        assert!(config.is_auth_page("/login/"));
        assert!(config.is_auth_page("/login?next=%2Fitems"));
        assert!(config.is_auth_page("/reset-password#step2"));
    }

    #[test]
    fn test_auth_endpoint_marker() {
        let config = GuardConfig::default();
        assert!(config.is_auth_endpoint("/auth/login"));
        assert!(config.is_auth_endpoint("/api/v1/auth/verify-otp"));
        assert!(!config.is_auth_endpoint("/inventory/items"));
        assert!(!config.is_auth_endpoint("/authors"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"redirect_delay_ms": 0, "require_session": true}"#).unwrap();
        assert_eq!(config.redirect_delay_ms, 0);
        assert!(config.require_session);
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.expiry_buffer(), Duration::seconds(5));
    }

    #[test]
    fn test_out_of_range_buffer_is_clamped() {
        let config = GuardConfig {
            expiry_buffer_ms: i64::MIN,
            ..GuardConfig::default()
        };
        assert_eq!(config.expiry_buffer(), Duration::zero());

        let config = GuardConfig {
            expiry_buffer_ms: i64::MAX,
            ..GuardConfig::default()
        };
        assert_eq!(config.expiry_buffer().num_milliseconds(), i64::MAX);
    }
}
