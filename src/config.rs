use std::env;

use tracing::info;
use url::Url;

use crate::errors::ClientError;

pub const DEFAULT_DAV_ROOT: &str = "/remote.php/dav";

/// Per-account session state, passed by reference into every service and
/// parser call. There is deliberately no global: two sessions for two
/// accounts can be active at once without coordination.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Absolute server URL, e.g. `https://cloud.example.com`.
    pub server_url: String,
    /// Login name used for HTTP basic auth.
    pub username: String,
    /// Account id the DAV files root is keyed by (usually equals username).
    pub user_id: String,
    /// App password or token.
    pub password: String,
    /// DAV path prefix on the server.
    pub dav_root: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl SessionConfig {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let config = Self {
            server_url: server_url.into(),
            username: username.into(),
            user_id: user_id.into(),
            password: password.into(),
            dav_root: DEFAULT_DAV_ROOT.to_string(),
            timeout_seconds: 120,
            user_agent: concat!("nimbusdav/", env!("CARGO_PKG_VERSION")).to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let server_url = env::var("NIMBUSDAV_SERVER_URL")
            .map_err(|_| ClientError::config("NIMBUSDAV_SERVER_URL is not set"))?;
        let username = env::var("NIMBUSDAV_USERNAME")
            .map_err(|_| ClientError::config("NIMBUSDAV_USERNAME is not set"))?;
        let user_id = env::var("NIMBUSDAV_USER_ID").unwrap_or_else(|_| username.clone());
        let password = env::var("NIMBUSDAV_PASSWORD")
            .map_err(|_| ClientError::config("NIMBUSDAV_PASSWORD is not set"))?;

        let mut config = Self::new(server_url, username, user_id, password)?;
        if let Some(timeout) = env::var("NIMBUSDAV_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_seconds = timeout;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.server_url.trim().is_empty() {
            return Err(ClientError::config("server_url is empty"));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(ClientError::config(format!(
                "server_url must start with 'http://' or 'https://', got '{}'",
                self.server_url
            )));
        }
        if let Err(e) = Url::parse(&self.server_url) {
            return Err(ClientError::config(format!(
                "server_url '{}' is not a valid absolute URL: {}",
                self.server_url, e
            )));
        }
        Ok(())
    }

    /// Server URL without a trailing slash.
    pub fn server_url_trimmed(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// DAV files root path for this account, e.g. `/remote.php/dav/files/alice`.
    pub fn files_root(&self) -> String {
        format!("{}/files/{}", self.dav_root, self.user_id)
    }

    /// Absolute URL of the DAV files root.
    pub fn files_root_url(&self) -> String {
        let url = format!("{}{}", self.server_url_trimmed(), self.files_root());
        info!("Constructed DAV files root URL: {}", url);
        url
    }
}

/// Per-listing visibility flags threaded into the multistatus parser.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// When false, entries with a dot-prefixed path component are dropped.
    pub show_hidden: bool,
    /// Component names that rescue an otherwise-hidden entry.
    pub hidden_allowlist: Vec<String>,
    /// Name given to the entry for the listing root itself.
    pub root_label: String,
    pub depth: crate::models::Depth,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            hidden_allowlist: Vec::new(),
            root_label: ".".to_string(),
            depth: crate::models::Depth::One,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000, // 1 second
            max_delay_ms: 30000,    // 30 seconds
            backoff_multiplier: 2.0,
            timeout_seconds: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_validation_rejects_bad_urls() {
        assert!(SessionConfig::new("", "alice", "alice", "pw").is_err());
        assert!(SessionConfig::new("cloud.example.com", "alice", "alice", "pw").is_err());
        assert!(SessionConfig::new("ftp://cloud.example.com", "alice", "alice", "pw").is_err());
        assert!(SessionConfig::new("https://cloud.example.com", "alice", "alice", "pw").is_ok());
    }

    #[test]
    fn test_files_root_construction() {
        let config =
            SessionConfig::new("https://cloud.example.com/", "alice", "alice", "pw").unwrap();
        assert_eq!(config.files_root(), "/remote.php/dav/files/alice");
        assert_eq!(
            config.files_root_url(),
            "https://cloud.example.com/remote.php/dav/files/alice"
        );
    }
}
