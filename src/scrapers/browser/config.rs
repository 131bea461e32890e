//! Browser and portal session configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scrapers::session::DEFAULT_LOGIN_MARKERS;

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// CDP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

/// Selectors and pacing for the portal's login form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFormConfig {
    #[serde(default = "default_email_selector")]
    pub email_selector: String,

    #[serde(default = "default_password_selector")]
    pub password_selector: String,

    /// Submit controls tried in order. An entry starting with `text:` clicks
    /// the first button whose label contains the rest of the entry.
    #[serde(default = "default_submit_selectors")]
    pub submit_selectors: Vec<String>,

    /// Seconds to wait for the form fields to appear.
    #[serde(default = "default_form_timeout")]
    pub form_timeout_secs: u64,

    /// Pause after landing on the portal root, in milliseconds.
    #[serde(default = "default_landing_settle")]
    pub landing_settle_ms: u64,

    /// Pause after submitting credentials, in milliseconds.
    #[serde(default = "default_submit_settle")]
    pub submit_settle_ms: u64,
}

impl Default for LoginFormConfig {
    fn default() -> Self {
        Self {
            email_selector: default_email_selector(),
            password_selector: default_password_selector(),
            submit_selectors: default_submit_selectors(),
            form_timeout_secs: default_form_timeout(),
            landing_settle_ms: default_landing_settle(),
            submit_settle_ms: default_submit_settle(),
        }
    }
}

fn default_email_selector() -> String {
    "#session_email".to_string()
}

fn default_password_selector() -> String {
    "#session_password".to_string()
}

fn default_submit_selectors() -> Vec<String> {
    vec![
        "input[type='submit']".to_string(),
        "text:Log in".to_string(),
        "button[type='submit']".to_string(),
    ]
}

fn default_form_timeout() -> u64 {
    10
}

fn default_landing_settle() -> u64 {
    2000
}

fn default_submit_settle() -> u64 {
    3000
}

/// How long to wait for single-page-app content before extracting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaWaitConfig {
    /// Pause after the document reports ready, in milliseconds.
    #[serde(default = "default_spa_settle")]
    pub settle_ms: u64,

    /// Selectors that signal rendered content; the first one found wins.
    #[serde(default = "default_spa_selectors")]
    pub selectors: Vec<String>,

    /// Budget per selector, in milliseconds.
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout_ms: u64,
}

impl Default for SpaWaitConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_spa_settle(),
            selectors: default_spa_selectors(),
            selector_timeout_ms: default_selector_timeout(),
        }
    }
}

fn default_spa_settle() -> u64 {
    2000
}

fn default_spa_selectors() -> Vec<String> {
    [
        "[data-testid]",
        "[class*='asset']",
        "[class*='card']",
        "[class*='content']",
        "[class*='collection']",
        "main",
        "[role='main']",
        ".bf-asset",
        ".asset-item",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_selector_timeout() -> u64 {
    3000
}

/// The portal being crawled and how to keep a session on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal root; login starts here.
    #[serde(default)]
    pub base_url: Option<String>,

    /// URL substrings that identify a login route.
    #[serde(default = "default_login_markers")]
    pub login_markers: Vec<String>,

    /// Where cookies and local storage are persisted between runs.
    /// Defaults to `auth_state.json` in the data directory.
    #[serde(default)]
    pub session_file: Option<PathBuf>,

    #[serde(default)]
    pub login: LoginFormConfig,

    #[serde(default)]
    pub spa: SpaWaitConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            login_markers: default_login_markers(),
            session_file: None,
            login: LoginFormConfig::default(),
            spa: SpaWaitConfig::default(),
        }
    }
}

fn default_login_markers() -> Vec<String> {
    DEFAULT_LOGIN_MARKERS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_config_defaults_fill_missing_fields() {
        let config: PortalConfig =
            serde_json::from_str(r#"{"base_url": "https://portal.test", "login": {"form_timeout_secs": 5}}"#)
                .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://portal.test"));
        assert_eq!(config.login_markers, vec!["sign", "login"]);
        assert_eq!(config.login.form_timeout_secs, 5);
        assert_eq!(config.login.email_selector, "#session_email");
        assert_eq!(config.login.submit_selectors.len(), 3);
        assert_eq!(config.spa.selectors[0], "[data-testid]");
    }

    #[test]
    fn browser_config_defaults() {
        let config: BrowserEngineConfig = toml::from_str("").unwrap();
        assert!(config.headless);
        assert_eq!(config.timeout, 30);
        assert!(config.remote_url.is_none());
    }
}
