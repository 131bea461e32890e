//! Page Fetcher: one chromiumoxide browser session on the portal.
//!
//! The session owns the only page. It logs in through the portal's form,
//! notices expiry by watching for login-route redirects, and persists
//! cookies plus local storage so later runs can skip the form.

mod config;
#[cfg(feature = "browser")]
mod cookies;
#[cfg(feature = "browser")]
mod login;
#[cfg(feature = "browser")]
mod page;
mod types;

pub use config::{
    default_headless, default_timeout, BrowserEngineConfig, LoginFormConfig, PortalConfig,
    SpaWaitConfig,
};
pub use types::{BrowserCookie, OriginStorage, SessionSnapshot, StorageEntry};

use std::path::PathBuf;

use super::extract::PageExtractor;

/// Everything needed to open a [`PortalSession`].
pub struct SessionOptions {
    pub browser: BrowserEngineConfig,
    pub portal: PortalConfig,
    /// Cookie and local storage file, used only for locally launched browsers.
    pub session_file: PathBuf,
    pub extractor: PageExtractor,
}

#[cfg(feature = "browser")]
pub use enabled::PortalSession;

#[cfg(not(feature = "browser"))]
pub use disabled::PortalSession;

#[cfg(feature = "browser")]
mod enabled {
    use std::path::PathBuf;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};

    use super::config::{BrowserEngineConfig, PortalConfig};
    use super::cookies::{apply_cookies, extract_browser_cookies, restore_local_storage};
    use super::page::{navigate_to_url, wait_for_page_ready, wait_for_spa_content, BROWSER_USER_AGENT};
    use super::types::{BrowserCookie, SessionSnapshot};
    use super::SessionOptions;
    use crate::models::PageResult;
    use crate::scrapers::extract::{extract_links, PageExtractor};
    use crate::scrapers::fetcher::{FetchError, PortalFetcher};
    use crate::scrapers::session::{LoginRouteDetector, SessionCheck, SessionPhase, SessionState};

    /// Authenticated browser session on the target portal.
    pub struct PortalSession {
        pub(super) config: BrowserEngineConfig,
        pub(super) portal: PortalConfig,
        pub(super) session_file: PathBuf,
        pub(super) browser: Option<Browser>,
        pub(super) page: Option<Page>,
        handler: Option<JoinHandle<()>>,
        pub(super) remote: bool,
        pub(super) state: SessionState,
        pub(super) detector: LoginRouteDetector,
        extractor: PageExtractor,
    }

    impl PortalSession {
        /// Common Chrome executable paths to check.
        const CHROME_PATHS: &'static [&'static str] = &[
            // Linux
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            // macOS
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            // Common install locations
            "/opt/google/chrome/google-chrome",
        ];

        /// Start a browser and open the session page.
        ///
        /// This is the only fallible step that reaches the caller: without a
        /// browser nothing else can run.
        pub async fn start(options: SessionOptions) -> Result<Self> {
            let detector = LoginRouteDetector::new(options.portal.login_markers.iter().cloned());
            let mut session = Self {
                config: options.browser,
                portal: options.portal,
                session_file: options.session_file,
                browser: None,
                page: None,
                handler: None,
                remote: false,
                state: SessionState::new(),
                detector,
                extractor: options.extractor,
            };

            session.ensure_browser().await?;
            session.open_page().await?;
            Ok(session)
        }

        pub fn phase(&self) -> SessionPhase {
            self.state.phase()
        }

        pub fn is_remote(&self) -> bool {
            self.remote
        }

        /// Find Chrome executable.
        fn find_chrome() -> Result<PathBuf> {
            for path in Self::CHROME_PATHS {
                let p = std::path::Path::new(path);
                if p.exists() {
                    info!("Found Chrome at: {}", path);
                    return Ok(p.to_path_buf());
                }
            }

            for cmd in &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
            ] {
                if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                    if output.status.success() {
                        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !path.is_empty() {
                            info!("Found Chrome in PATH: {}", path);
                            return Ok(PathBuf::from(path));
                        }
                    }
                }
            }

            Err(anyhow::anyhow!(
                "Chrome/Chromium not found. Install it, or set browser.remote_url / BROWSERLESS_URL"
            ))
        }

        /// Connect to the remote browser if configured, else launch locally.
        async fn ensure_browser(&mut self) -> Result<()> {
            if self.browser.is_some() {
                return Ok(());
            }

            if let Some(remote_url) = self.config.remote_url.clone() {
                match self.connect_remote(&remote_url).await {
                    Ok(()) => {
                        self.remote = true;
                        return Ok(());
                    }
                    Err(e) => warn!(
                        "Remote browser unavailable ({:#}); launching a local browser",
                        e
                    ),
                }
            }

            self.launch_local().await
        }

        async fn launch_local(&mut self) -> Result<()> {
            info!("Launching browser (headless={})", self.config.headless);

            let chrome_path = Self::find_chrome()?;
            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

            // with_head means NOT headless
            if !self.config.headless {
                builder = builder.with_head();
            }

            if let Some(ref proxy) = self.config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }

            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-sync")
                .arg("--no-sandbox")
                .arg("--disable-gpu");

            for arg in &self.config.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder
                .request_timeout(Duration::from_secs(self.config.timeout))
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .context("Failed to launch browser")?;

            self.handler = Some(tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            }));
            self.browser = Some(browser);
            self.remote = false;

            Ok(())
        }

        /// Connect to a remote Chrome instance.
        async fn connect_remote(&mut self, url: &str) -> Result<()> {
            info!(
                "Connecting to remote browser at {} (timeout: {}s)",
                url, self.config.timeout
            );

            let ws_url = if url.contains("/devtools/") {
                url.to_string()
            } else {
                // Discover the WebSocket URL from the /json/version endpoint
                let http_url = url
                    .replace("ws://", "http://")
                    .replace("wss://", "https://");
                let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

                let resp: serde_json::Value = reqwest::Client::new()
                    .get(&version_url)
                    .timeout(Duration::from_secs(self.config.timeout))
                    .send()
                    .await
                    .context("Failed to connect to remote browser")?
                    .json()
                    .await
                    .context("Failed to parse browser version info")?;

                resp.get("webSocketDebuggerUrl")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?
            };

            info!("Connecting to WebSocket: {}", ws_url);

            let handler_config = chromiumoxide::handler::HandlerConfig {
                request_timeout: Duration::from_secs(self.config.timeout),
                ..Default::default()
            };

            let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
                .await
                .context("Failed to connect to remote browser")?;

            self.handler = Some(tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            }));
            self.browser = Some(browser);

            Ok(())
        }

        async fn open_page(&mut self) -> Result<()> {
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("browser not initialized after ensure_browser"))?;
            let page = browser.new_page("about:blank").await?;
            page.execute(SetUserAgentOverrideParams::new(
                BROWSER_USER_AGENT.to_string(),
            ))
            .await?;
            self.page = Some(page);

            if !self.remote {
                self.restore_session().await;
            }
            Ok(())
        }

        /// Load saved cookies and local storage into the fresh page.
        async fn restore_session(&mut self) {
            let snapshot = match SessionSnapshot::load(&self.session_file) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => return,
                Err(e) => {
                    warn!("Ignoring unreadable session file {:?}: {}", self.session_file, e);
                    return;
                }
            };
            let Some(page) = self.page.as_ref() else {
                return;
            };

            let applied = apply_cookies(page, &snapshot.cookies).await;
            info!("Restored {} cookies from {:?}", applied, self.session_file);

            if let Some(base) = self.portal.base_url.clone() {
                let base_origin = url::Url::parse(&base)
                    .map(|u| u.origin().ascii_serialization())
                    .unwrap_or_default();
                let entries = snapshot.storage_for(&base_origin);
                if !entries.is_empty() {
                    let timeout = Duration::from_secs(self.config.timeout);
                    match navigate_to_url(page, &base, timeout).await {
                        Ok(()) => {
                            if let Err(e) = restore_local_storage(page, entries).await {
                                warn!("Failed to restore local storage: {}", e);
                            }
                        }
                        Err(e) => warn!("Could not open portal to restore storage: {}", e),
                    }
                }
            }

            if applied > 0 {
                self.state.restored();
            }
        }

        /// Cookies the portal has set, for authenticated downloads outside the browser.
        pub async fn cookies(&mut self) -> Vec<BrowserCookie> {
            let target = match self.portal.base_url.clone() {
                Some(base) => Some(base),
                None => self.current_url().await,
            };
            match (self.page.as_ref(), target) {
                (Some(page), Some(url)) => extract_browser_cookies(page, &url).await,
                _ => Vec::new(),
            }
        }

        /// Release the browser. Safe to call more than once.
        pub async fn close(&mut self) {
            if let Some(page) = self.page.take() {
                if let Err(e) = page.close().await {
                    debug!("Page close failed: {}", e);
                }
            }
            if let Some(mut browser) = self.browser.take() {
                // A remote browser outlives this session.
                if !self.remote {
                    if let Err(e) = browser.close().await {
                        debug!("Browser close failed: {}", e);
                    }
                    let _ = browser.wait().await;
                }
            }
            if let Some(handler) = self.handler.take() {
                handler.abort();
            }
        }

        pub(super) fn navigation_timeout(&self) -> Duration {
            Duration::from_secs(self.config.timeout)
        }

        fn page(&self) -> Result<&Page, FetchError> {
            self.page.as_ref().ok_or(FetchError::NoPage)
        }
    }

    #[async_trait]
    impl PortalFetcher for PortalSession {
        async fn ensure_logged_in(&mut self) -> bool {
            if self.page.is_none() {
                return false;
            }

            let on_login = self.on_login_route().await;
            match self.state.observe(on_login) {
                SessionCheck::Valid => true,
                SessionCheck::NeedsLogin(creds) => {
                    info!("Session expired, re-authenticating...");
                    self.login(&creds.username, &creds.password).await
                }
                SessionCheck::Unrecoverable => {
                    debug!("On a login route with no way to re-authenticate");
                    false
                }
            }
        }

        async fn on_login_route(&mut self) -> bool {
            match self.current_url().await {
                Some(url) => self.detector.is_login_route(&url),
                None => false,
            }
        }

        async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
            let page = self.page()?;
            navigate_to_url(page, url, timeout).await?;
            wait_for_page_ready(page, timeout).await;
            Ok(())
        }

        async fn scrape(&mut self) -> Result<PageResult, FetchError> {
            let page = self.page()?;
            wait_for_spa_content(page, &self.portal.spa, self.navigation_timeout()).await;

            let html = page
                .content()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
            let url = page
                .url()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?
                .unwrap_or_default();

            Ok(self.extractor.extract(&html, &url))
        }

        async fn links(&mut self) -> Result<Vec<String>, FetchError> {
            let page = self.page()?;
            let html = page
                .content()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
            let url = page
                .url()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?
                .unwrap_or_default();
            Ok(extract_links(&html, &url))
        }

        async fn current_url(&mut self) -> Option<String> {
            let page = self.page.as_ref()?;
            page.url().await.ok().flatten()
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
mod disabled {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::types::BrowserCookie;
    use super::SessionOptions;
    use crate::models::PageResult;
    use crate::scrapers::fetcher::{FetchError, PortalFetcher};
    use crate::scrapers::session::SessionPhase;

    const NOT_COMPILED: &str =
        "Browser support not compiled. Rebuild with: cargo build --features browser";

    pub struct PortalSession;

    impl PortalSession {
        pub async fn start(_options: SessionOptions) -> Result<Self> {
            Err(anyhow::anyhow!(NOT_COMPILED))
        }

        pub fn phase(&self) -> SessionPhase {
            SessionPhase::Uninitialized
        }

        pub fn is_remote(&self) -> bool {
            false
        }

        pub async fn login(&mut self, _username: &str, _password: &str) -> bool {
            false
        }

        pub async fn cookies(&mut self) -> Vec<BrowserCookie> {
            Vec::new()
        }

        pub async fn close(&mut self) {}
    }

    #[async_trait]
    impl PortalFetcher for PortalSession {
        async fn ensure_logged_in(&mut self) -> bool {
            false
        }

        async fn on_login_route(&mut self) -> bool {
            false
        }

        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), FetchError> {
            Err(FetchError::Browser(NOT_COMPILED.to_string()))
        }

        async fn scrape(&mut self) -> Result<PageResult, FetchError> {
            Err(FetchError::Browser(NOT_COMPILED.to_string()))
        }

        async fn links(&mut self) -> Result<Vec<String>, FetchError> {
            Err(FetchError::Browser(NOT_COMPILED.to_string()))
        }

        async fn current_url(&mut self) -> Option<String> {
            None
        }
    }
}
