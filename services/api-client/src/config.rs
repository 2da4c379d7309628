//! Client configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientResult;

/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Default deadline for a request, including any wait for a token refresh
    pub request_timeout: Duration,
    /// Deadline for the token refresh call
    pub refresh_timeout: Duration,
    /// File the session is persisted to; in memory when unset
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            session_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClientConfig {
    base_url: String,
    request_timeout_secs: u64,
    refresh_timeout_secs: u64,
    session_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Create a new ClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `CHIRP_BASE_URL`: API base URL (default: "http://localhost:3000/api")
    /// - `CHIRP_REQUEST_TIMEOUT_SECS`: Default request timeout (default: 30)
    /// - `CHIRP_REFRESH_TIMEOUT_SECS`: Token refresh timeout (default: 10)
    /// - `CHIRP_SESSION_FILE`: Where to persist the session (default: unset)
    pub fn from_env() -> ClientResult<Self> {
        let raw: RawClientConfig = config::Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("refresh_timeout_secs", 10_i64)?
            .add_source(config::Environment::with_prefix("CHIRP").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            base_url: raw.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            refresh_timeout: Duration::from_secs(raw.refresh_timeout_secs),
            session_file: raw.session_file,
        })
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the refresh call timeout
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}
