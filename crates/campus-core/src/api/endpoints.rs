/// Base URL used when neither the config file nor the environment sets one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// URLs of the authentication endpoints, derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login(&self) -> String {
        format!("{}/users/login/", self.base_url)
    }

    pub fn logout(&self) -> String {
        format!("{}/users/logout/", self.base_url)
    }

    pub fn token_refresh(&self) -> String {
        format!("{}/users/token/refresh/", self.base_url)
    }

    pub fn check_permission(&self, code: &str) -> String {
        format!("{}/users/check-permission/{}/", self.base_url, code)
    }

    /// Resolve a request target. Absolute URLs pass through untouched;
    /// anything else is treated as a path under the base URL.
    pub fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}/{}", self.base_url, target.trim_start_matches('/'))
        }
    }
}
