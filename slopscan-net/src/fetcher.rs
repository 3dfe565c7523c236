//! Page fetch collaborator
//!
//! The dispatcher only sees the [`HtmlFetcher`] trait. [`ReqwestFetcher`]
//! binds it to real HTTP; tests bind it to in-memory fakes.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client};
use tracing::{debug, warn};
use url::Url;

use crate::{create_client, FetchConfig, FetchError};

/// Markup fetched for a result URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    /// Whether the body was cut at the byte ceiling
    pub truncated: bool,
}

/// Source of raw markup for a URL
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch_markup(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Parse `url` and reject anything but http(s)
pub fn check_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

/// Whether a Content-Type header value denotes HTML
pub fn is_html_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Append `chunk` to `buf` without exceeding `max` bytes.
/// Returns true once the ceiling has been hit.
pub fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], max: usize) -> bool {
    let room = max.saturating_sub(buf.len());
    if chunk.len() > room {
        buf.extend_from_slice(&chunk[..room]);
        true
    } else {
        buf.extend_from_slice(chunk);
        false
    }
}

/// reqwest-backed fetcher
pub struct ReqwestFetcher {
    client: Client,
    config: FetchConfig,
}

impl ReqwestFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = create_client(&config)?;
        Ok(Self { client, config })
    }

    async fn fetch_inner(&self, url: Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("Fetch of {} returned status: {}", url, status);
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html_content_type(content_type) {
                return Err(FetchError::NotHtml(content_type.to_string()));
            }
        }

        let final_url = response.url().to_string();
        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        let mut truncated = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if push_capped(&mut body, &chunk, self.config.max_bytes) {
                truncated = true;
                break;
            }
        }

        if truncated {
            debug!("Truncated {} at {} bytes", final_url, self.config.max_bytes);
        }

        Ok(FetchedPage {
            html: String::from_utf8_lossy(&body).into_owned(),
            final_url,
            status: status.as_u16(),
            truncated,
        })
    }
}

#[async_trait]
impl HtmlFetcher for ReqwestFetcher {
    async fn fetch_markup(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = check_url(url)?;

        debug!("Fetching: {}", url);

        match tokio::time::timeout(self.config.timeout(), self.fetch_inner(parsed)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.timeout_ms)),
        }
    }
}
