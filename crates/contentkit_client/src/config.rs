//! Configuration for a content stack.

use contentkit_cache::DEFAULT_SWEEP_HORIZON;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Header carrying the stack API key.
pub const API_KEY_HEADER: &str = "api_key";
/// Header carrying the delivery token.
pub const ACCESS_TOKEN_HEADER: &str = "access_token";
/// Header carrying the publishing environment.
pub const ENVIRONMENT_HEADER: &str = "environment";
/// Headers that must be present and non-empty before any request is made.
pub const REQUIRED_HEADERS: [&str; 2] = [API_KEY_HEADER, ACCESS_TOKEN_HEADER];

/// Hosting region of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// North America (default).
    #[default]
    Us,
    /// Europe.
    Eu,
    /// Azure North America.
    AzureNa,
    /// Azure Europe.
    AzureEu,
    /// Google Cloud North America.
    GcpNa,
}

impl Region {
    /// Returns the delivery host for the region.
    pub fn host(&self) -> &'static str {
        match self {
            Region::Us => "cdn.contentstack.io",
            Region::Eu => "eu-cdn.contentstack.com",
            Region::AzureNa => "azure-na-cdn.contentstack.com",
            Region::AzureEu => "azure-eu-cdn.contentstack.com",
            Region::GcpNa => "gcp-na-cdn.contentstack.com",
        }
    }
}

/// Configuration for a content stack.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Stack API key.
    pub api_key: String,
    /// Delivery token.
    pub delivery_token: String,
    /// Publishing environment.
    pub environment: String,
    /// Hosting region, used when no explicit host is set.
    pub region: Region,
    /// Explicit delivery host, overriding the region.
    pub host: Option<String>,
    /// API version path segment.
    pub api_version: String,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Directory for the response cache. `None` keeps it in memory.
    pub cache_dir: Option<PathBuf>,
    /// Age up to which a cached response counts as fresh.
    ///
    /// Zero, the default, means cached responses are never fresh.
    pub max_cache_age: Duration,
    /// Age beyond which a sweep removes cached responses.
    pub sweep_horizon: Duration,
}

impl StackConfig {
    /// Creates a configuration for the given credentials.
    pub fn new(
        api_key: impl Into<String>,
        delivery_token: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            delivery_token: delivery_token.into(),
            environment: environment.into(),
            region: Region::default(),
            host: None,
            api_version: "v3".into(),
            headers: BTreeMap::new(),
            cache_dir: None,
            max_cache_age: Duration::ZERO,
            sweep_horizon: DEFAULT_SWEEP_HORIZON,
        }
    }

    /// Sets the hosting region.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Sets an explicit delivery host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the API version path segment.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Stores cached responses under `dir`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the age up to which cached responses are fresh.
    pub fn with_max_cache_age(mut self, age: Duration) -> Self {
        self.max_cache_age = age;
        self
    }

    /// Sets the sweep horizon.
    pub fn with_sweep_horizon(mut self, horizon: Duration) -> Self {
        self.sweep_horizon = horizon;
        self
    }

    /// Returns the delivery host in use.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(self.region.host())
    }

    /// Returns the URL every endpoint path is appended to.
    pub fn base_url(&self) -> String {
        let host = self.host().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/{}", host, self.api_version)
        } else {
            format!("https://{}/{}", host, self.api_version)
        }
    }

    /// Returns the stack-level headers. Empty credentials are left out so
    /// header validation reports them as missing.
    pub fn stack_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        for (name, value) in [
            (API_KEY_HEADER, &self.api_key),
            (ACCESS_TOKEN_HEADER, &self.delivery_token),
            (ENVIRONMENT_HEADER, &self.environment),
        ] {
            if !value.is_empty() {
                headers.insert(name.to_string(), value.clone());
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_config_builder() {
        let config = StackConfig::new("blt1", "cs2", "production")
            .with_region(Region::Eu)
            .with_header("branch", "main")
            .with_max_cache_age(Duration::from_secs(60))
            .with_cache_dir("/tmp/contentkit");

        assert_eq!(config.host(), "eu-cdn.contentstack.com");
        assert_eq!(config.base_url(), "https://eu-cdn.contentstack.com/v3");
        assert_eq!(config.max_cache_age, Duration::from_secs(60));
        assert_eq!(config.sweep_horizon, DEFAULT_SWEEP_HORIZON);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/contentkit")));
    }

    #[test]
    fn explicit_host_overrides_region() {
        let config = StackConfig::new("k", "t", "e")
            .with_region(Region::AzureNa)
            .with_host("http://localhost:8080/");
        assert_eq!(config.base_url(), "http://localhost:8080/v3");
    }

    #[test]
    fn default_cache_age_is_zero() {
        assert_eq!(StackConfig::new("k", "t", "e").max_cache_age, Duration::ZERO);
    }

    #[test]
    fn stack_headers_carry_credentials() {
        let headers = StackConfig::new("blt1", "cs2", "production")
            .with_header("branch", "main")
            .stack_headers();
        assert_eq!(headers[API_KEY_HEADER], "blt1");
        assert_eq!(headers[ACCESS_TOKEN_HEADER], "cs2");
        assert_eq!(headers[ENVIRONMENT_HEADER], "production");
        assert_eq!(headers["branch"], "main");
    }

    #[test]
    fn empty_credentials_are_omitted() {
        let headers = StackConfig::new("", "cs2", "production").stack_headers();
        assert!(!headers.contains_key(API_KEY_HEADER));
    }
}
