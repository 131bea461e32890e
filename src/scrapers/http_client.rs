//! HTTP client for authenticated media downloads.
//!
//! Media files are fetched outside the browser, so the client is seeded with
//! the browser session's cookies.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::browser::BrowserCookie;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve user agent from config value.
/// - None => browser-like default
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}

/// URL a cookie should be registered against in a reqwest jar.
fn cookie_origin(cookie: &BrowserCookie) -> Option<Url> {
    let host = cookie.domain.trim_start_matches('.');
    if host.is_empty() {
        return None;
    }
    let scheme = if cookie.secure { "https" } else { "http" };
    Url::parse(&format!("{}://{}{}", scheme, host, cookie.path)).ok()
}

/// Build a cookie jar from browser cookies.
pub fn cookie_jar(cookies: &[BrowserCookie]) -> Jar {
    let jar = Jar::default();
    for cookie in cookies {
        if cookie.name.is_empty() {
            continue;
        }
        if let Some(url) = cookie_origin(cookie) {
            let cookie_str = format!(
                "{}={}; Domain={}; Path={}",
                cookie.name, cookie.value, cookie.domain, cookie.path
            );
            jar.add_cookie_str(&cookie_str, &url);
        }
    }
    jar
}

/// Thin wrapper over a configured reqwest client.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client without session cookies.
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        Self::with_cookies(timeout, user_agent, &[])
    }

    /// Create a client that sends the given browser cookies.
    pub fn with_cookies(
        timeout: Duration,
        user_agent: Option<&str>,
        cookies: &[BrowserCookie],
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .cookie_provider(Arc::new(cookie_jar(cookies)))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        debug!("HTTP client ready with {} session cookies", cookies.len());
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Stream `url` into `dest`, stopping once more than `max_bytes` arrive.
    pub async fn download_to(
        &self,
        url: &str,
        dest: &Path,
        max_bytes: u64,
    ) -> Result<u64, DownloadError> {
        info!("Downloading {}", url);
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(DownloadError::TooLarge { limit: max_bytes });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(DownloadError::TooLarge { limit: max_bytes });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}
