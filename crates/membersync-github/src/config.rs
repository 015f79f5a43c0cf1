//! GitHub client configuration.

use std::env::VarError;
use std::fmt;
use std::time::Duration;

use membersync_reconcile::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";
pub const DEFAULT_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Connection settings for the GitHub REST and SCIM APIs.
#[derive(Clone)]
pub struct GitHubConfig {
    /// API root, with a trailing slash (GHES: `https://host/api/v3/`).
    pub base_url: String,
    /// Token sent as `Authorization: Bearer`.
    pub token: String,
    /// Value of the `X-GitHub-Api-Version` header.
    pub api_version: String,
    pub request_timeout: Duration,
    /// Page size for page-numbered list endpoints (max 100).
    pub per_page: u32,
    pub user_agent: String,
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("per_page", &self.per_page)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl GitHubConfig {
    /// Configuration with defaults for everything but the token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            per_page: DEFAULT_PER_PAGE,
            user_agent: format!("membersync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let token = reader("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GITHUB_TOKEN".into()))?;

        let mut config = Self::new(token.trim());

        if let Ok(raw) = reader("GITHUB_BASE_URL") {
            config.base_url = parse_base_url(&raw)?;
        }
        if let Ok(raw) = reader("GITHUB_API_VERSION") {
            config.api_version = raw.trim().to_string();
        }
        if let Ok(raw) = reader("GITHUB_REQUEST_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("GITHUB_REQUEST_TIMEOUT_SECS".into(), e.to_string())
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = reader("GITHUB_PER_PAGE") {
            config.per_page = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::InvalidValue("GITHUB_PER_PAGE".into(), e.to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.per_page) {
            return Err(ConfigError::InvalidValue(
                "GITHUB_PER_PAGE".into(),
                format!("{} is outside 1..=100", self.per_page),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "GITHUB_REQUEST_TIMEOUT_SECS".into(),
                "must be positive".into(),
            ));
        }
        if self.api_version.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GITHUB_API_VERSION".into(),
                "must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Validate an API root, forcing a trailing slash so the path is kept when
/// segments are appended.
fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = url::Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidValue("GITHUB_BASE_URL".into(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue(
            "GITHUB_BASE_URL".into(),
            format!("{raw} cannot be used as an API root"),
        ));
    }
    Ok(url.to_string())
}
