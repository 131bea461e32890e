//! Navigation and readiness helpers for the session page.

use std::time::Duration;

use tracing::{debug, info, warn};

use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;

use super::config::SpaWaitConfig;
use crate::scrapers::fetcher::FetchError;

/// Default user agent for browser requests.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Navigate to a URL with timeout handling.
pub(crate) async fn navigate_to_url(
    page: &Page,
    url: &str,
    timeout: Duration,
) -> Result<(), FetchError> {
    info!("Navigating to {}", url);
    let nav_params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            message: format!("invalid URL: {}", e),
        })?;

    tokio::time::timeout(timeout, page.execute(nav_params))
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            timeout,
        })?
        .map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    Ok(())
}

/// Wait for the page to reach a ready state.
pub(crate) async fn wait_for_page_ready(page: &Page, timeout: Duration) {
    match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => {
            debug!("Could not check ready state: {}", e);
        }
        Err(_) => {
            warn!("Timeout waiting for page ready state");
        }
    }
}

/// Poll for a selector, returning whether it showed up in time.
pub(crate) async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, page.find_element(selector)).await {
            Ok(Ok(_)) => return true,
            Ok(Err(e)) => debug!("Selector {} not found yet: {}", selector, e),
            Err(_) => return false,
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL.min(remaining)).await;
    }
}

/// Give a single-page app time to render its content.
///
/// Never fails: a page that never settles is still extracted as-is.
pub(crate) async fn wait_for_spa_content(page: &Page, spa: &SpaWaitConfig, ready_timeout: Duration) {
    wait_for_page_ready(page, ready_timeout).await;
    tokio::time::sleep(Duration::from_millis(spa.settle_ms)).await;

    let per_selector = Duration::from_millis(spa.selector_timeout_ms);
    for selector in &spa.selectors {
        if wait_for_selector(page, selector, per_selector).await {
            debug!("Content selector {} present", selector);
            return;
        }
    }
    debug!("No content selector appeared; extracting anyway");
}
