//! Cookie and local storage transfer between a page and a [`SessionSnapshot`].

use anyhow::Result;
use tracing::{debug, warn};

use chromiumoxide::cdp::browser_protocol::network::{CookieParam, GetCookiesParams};
use chromiumoxide::Page;

use super::types::{BrowserCookie, StorageEntry};

const READ_LOCAL_STORAGE_SCRIPT: &str = r#"
    JSON.stringify(Object.keys(localStorage).map((k) => ({ name: k, value: localStorage.getItem(k) })))
"#;

/// Extract cookies visible to `url` from the browser page.
pub(crate) async fn extract_browser_cookies(page: &Page, url: &str) -> Vec<BrowserCookie> {
    let cookie_params = GetCookiesParams::builder()
        .urls(vec![url.to_string()])
        .build();

    let browser_cookies = match page.execute(cookie_params).await {
        Ok(result) => result.result.cookies,
        Err(e) => {
            warn!(
                "Failed to get cookies via CDP: {}, trying page.get_cookies()",
                e
            );
            page.get_cookies().await.unwrap_or_default()
        }
    };

    debug!("Got {} cookies from browser", browser_cookies.len());
    browser_cookies
        .iter()
        .map(|c| BrowserCookie {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            secure: c.secure,
            http_only: c.http_only,
            expires: (!c.session).then_some(c.expires),
        })
        .collect()
}

/// Install saved cookies on the page.
pub(crate) async fn apply_cookies(page: &Page, cookies: &[BrowserCookie]) -> usize {
    let mut applied = 0;
    for cookie in cookies {
        if cookie.name.is_empty() || cookie.domain.is_empty() {
            continue;
        }

        let cookie_param = CookieParam::builder()
            .name(cookie.name.as_str())
            .value(cookie.value.as_str())
            .domain(cookie.domain.as_str())
            .path(cookie.path.as_str())
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build();

        match cookie_param {
            Ok(param) => match page.set_cookie(param).await {
                Ok(_) => applied += 1,
                Err(e) => warn!("Failed to set cookie {}: {}", cookie.name, e),
            },
            Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
        }
    }
    applied
}

/// Origin of the page's current document.
pub(crate) async fn current_origin(page: &Page) -> Option<String> {
    page.evaluate("window.location.origin".to_string())
        .await
        .ok()
        .and_then(|r| r.into_value::<String>().ok())
        .filter(|o| o.starts_with("http"))
}

/// Read every local storage entry of the current origin.
pub(crate) async fn capture_local_storage(page: &Page) -> Result<Vec<StorageEntry>> {
    let raw: String = page
        .evaluate(READ_LOCAL_STORAGE_SCRIPT.to_string())
        .await?
        .into_value()?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write entries into the current origin's local storage.
pub(crate) async fn restore_local_storage(page: &Page, entries: &[StorageEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let script = format!(
        "(() => {{ const items = {}; for (const item of items) {{ localStorage.setItem(item.name, item.value); }} return items.length; }})()",
        serde_json::to_string(entries)?
    );
    page.evaluate(script).await?;
    debug!("Restored {} local storage entries", entries.len());
    Ok(())
}
