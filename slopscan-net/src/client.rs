//! HTTP client configuration
//!
//! Creates the reqwest client used to fetch result pages.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 8000;

/// Default response body ceiling (2 MiB)
pub const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Bytes read before the body is truncated
    pub max_bytes: usize,
    /// Fixed user agent; a random desktop one is used when unset
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_bytes: DEFAULT_MAX_BYTES,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Errors from page fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Not an HTML document: {0}")]
    NotHtml(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Create the HTTP client used for page fetches
pub fn create_client(config: &FetchConfig) -> Result<Client, FetchError> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_string());

    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .user_agent(user_agent)
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}
