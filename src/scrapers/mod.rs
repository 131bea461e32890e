//! Portal access: browser session, extraction and crawling.

pub mod browser;
pub mod crawler;
pub mod extract;
pub mod fetcher;
pub mod http_client;
pub mod session;
pub mod url_utils;

pub use browser::{
    BrowserCookie, BrowserEngineConfig, PortalConfig, PortalSession, SessionOptions,
    SessionSnapshot,
};
pub use crawler::{CrawlOptions, Crawler};
pub use extract::{ContentExtractor, ExtractionStrategy, PageExtractor};
pub use fetcher::{FetchError, PortalFetcher};
pub use http_client::{DownloadError, HttpClient};
pub use session::{Credentials, LoginRouteDetector, SessionCheck, SessionPhase, SessionState};
