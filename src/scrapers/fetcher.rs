//! The fetcher contract the crawler drives.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PageResult;

/// Per-page fetch failures. None of these stop a crawl.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("no open browser page")]
    NoPage,

    #[error("browser error: {0}")]
    Browser(String),

    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// One authenticated browsing session over the target portal.
///
/// Owns the only page object; callers drive it strictly sequentially.
#[async_trait]
pub trait PortalFetcher: Send {
    /// Re-authenticate if the current page is a login route.
    ///
    /// Returns `true` when the session is usable afterwards.
    async fn ensure_logged_in(&mut self) -> bool;

    /// Whether the current page sits on a login route.
    async fn on_login_route(&mut self) -> bool;

    /// Navigate the page, failing after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Extract the current page.
    async fn scrape(&mut self) -> Result<PageResult, FetchError>;

    /// Absolute link targets on the current page.
    async fn links(&mut self) -> Result<Vec<String>, FetchError>;

    async fn current_url(&mut self) -> Option<String>;
}
