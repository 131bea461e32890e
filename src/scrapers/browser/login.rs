//! Form login and session persistence.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use chromiumoxide::Page;

use super::config::LoginFormConfig;
use super::cookies::{capture_local_storage, current_origin, extract_browser_cookies};
use super::page::{navigate_to_url, wait_for_page_ready, wait_for_selector};
use super::types::{OriginStorage, SessionSnapshot};
use super::PortalSession;
use crate::scrapers::session::Credentials;

/// Prefix marking a submit entry as a button label rather than a selector.
const TEXT_PREFIX: &str = "text:";

impl PortalSession {
    /// Log in through the portal's form.
    ///
    /// Never fails outward: every error is logged and reported as `false`.
    /// The credentials are kept for later re-authentication either way.
    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        let creds = Credentials::new(username, password);
        self.state.begin_login(creds.clone());
        info!("Logging in as {}", creds.username);

        match self.perform_login(&creds).await {
            Ok(true) => {
                self.state.login_succeeded();
                info!("Login successful");
                if !self.remote {
                    self.save_session().await;
                }
                true
            }
            Ok(false) => {
                warn!("Login failed: portal still shows a login route");
                self.state.login_failed();
                false
            }
            Err(e) => {
                warn!("Login failed: {:#}", e);
                self.state.login_failed();
                false
            }
        }
    }

    async fn perform_login(&self, creds: &Credentials) -> Result<bool> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no open browser page"))?;
        let base_url = self
            .portal
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("portal.base_url is not configured"))?;
        let form = &self.portal.login;
        let timeout = self.navigation_timeout();

        navigate_to_url(page, base_url, timeout).await?;
        wait_for_page_ready(page, timeout).await;
        tokio::time::sleep(Duration::from_millis(form.landing_settle_ms)).await;

        let landed = page.url().await?.unwrap_or_default();
        if self.detector.is_login_route(&landed) {
            debug!("Redirected to {}, filling login form", landed);
            fill_login_form(page, form, creds).await?;
            wait_for_page_ready(page, timeout).await;
            tokio::time::sleep(Duration::from_millis(form.submit_settle_ms)).await;
        } else {
            debug!("Landed on {} without a login prompt", landed);
        }

        let final_url = page.url().await?.unwrap_or_default();
        Ok(!self.detector.is_login_route(&final_url))
    }

    /// Write cookies and local storage to the session file.
    pub(super) async fn save_session(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };

        let origin = match current_origin(page).await {
            Some(origin) => origin,
            None => match self.portal.base_url.as_deref() {
                Some(base) => base.to_string(),
                None => return,
            },
        };

        let cookies = extract_browser_cookies(page, &origin).await;
        let local_storage = match capture_local_storage(page).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Could not read local storage: {}", e);
                Vec::new()
            }
        };

        let snapshot = SessionSnapshot {
            cookies,
            origins: vec![OriginStorage {
                origin,
                local_storage,
            }],
        };
        if let Err(e) = snapshot.save(&self.session_file) {
            warn!("Failed to save session to {:?}: {}", self.session_file, e);
        }
    }
}

async fn fill_login_form(page: &Page, form: &LoginFormConfig, creds: &Credentials) -> Result<()> {
    let form_timeout = Duration::from_secs(form.form_timeout_secs);
    if !wait_for_selector(page, &form.email_selector, form_timeout).await {
        bail!("login form field {} did not appear", form.email_selector);
    }

    let email = page
        .find_element(form.email_selector.as_str())
        .await
        .context("email field")?;
    email.click().await?;
    email.type_str(&creds.username).await?;

    let password = page
        .find_element(form.password_selector.as_str())
        .await
        .context("password field")?;
    password.click().await?;
    password.type_str(&creds.password).await?;

    if !submit_login_form(page, &form.submit_selectors).await {
        debug!("No submit control matched, pressing Enter");
        password.press_key("Enter").await?;
    }
    Ok(())
}

/// Try each submit control in order; `true` once one was clicked.
async fn submit_login_form(page: &Page, submit_selectors: &[String]) -> bool {
    for entry in submit_selectors {
        if let Some(label) = entry.strip_prefix(TEXT_PREFIX) {
            if click_button_with_label(page, label).await {
                debug!("Submitted via button labelled {:?}", label);
                return true;
            }
            continue;
        }

        if let Ok(button) = page.find_element(entry.as_str()).await {
            match button.click().await {
                Ok(_) => {
                    debug!("Submitted via {}", entry);
                    return true;
                }
                Err(e) => debug!("Submit control {} not clickable: {}", entry, e),
            }
        }
    }
    false
}

async fn click_button_with_label(page: &Page, label: &str) -> bool {
    let Ok(label_json) = serde_json::to_string(label) else {
        return false;
    };
    let script = format!(
        r#"(() => {{
            const label = {};
            const candidates = document.querySelectorAll('button, input[type="button"], [role="button"]');
            const match = Array.from(candidates).find((el) => (el.innerText || el.value || '').includes(label));
            if (match) {{ match.click(); return true; }}
            return false;
        }})()"#,
        label_json
    );

    page.evaluate(script)
        .await
        .ok()
        .and_then(|r| r.into_value::<bool>().ok())
        .unwrap_or(false)
}
