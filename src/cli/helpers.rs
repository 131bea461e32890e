//! Shared CLI helpers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, Settings};
use crate::knowledge::SqliteKnowledgeStore;
use crate::scrapers::{
    BrowserCookie, HttpClient, PageExtractor, PortalSession, SessionOptions, SessionSnapshot,
};
use crate::services::transcription::{api_key_from_env, GeminiTranscriber};

/// Portal credentials given on the command line or through the environment.
#[derive(Debug, Clone, clap::Args)]
pub struct CredentialArgs {
    /// Portal username (email)
    #[arg(long, env = "PORTAL_USERNAME")]
    pub username: Option<String>,

    /// Portal password
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl CredentialArgs {
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Spinner with the given message.
pub fn spinner(message: impl Into<String>) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.into());
    Ok(pb)
}

/// Open the knowledge store, creating the data directory if needed.
pub fn open_store(settings: &Settings) -> anyhow::Result<Arc<SqliteKnowledgeStore>> {
    settings.ensure_directories()?;
    let path = settings.database_path();
    let store = SqliteKnowledgeStore::new(&path)
        .with_context(|| format!("Failed to open knowledge store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Start a browser session on the configured portal.
pub async fn start_session(settings: &Settings, config: &Config) -> anyhow::Result<PortalSession> {
    let options = SessionOptions {
        browser: config.browser.clone(),
        portal: config.portal.clone(),
        session_file: settings.session_file.clone(),
        extractor: PageExtractor::new(config.extraction.content_extractor()),
    };
    PortalSession::start(options).await
}

/// Cookies saved by an earlier login, if any.
pub fn saved_cookies(settings: &Settings) -> Vec<BrowserCookie> {
    match SessionSnapshot::load(&settings.session_file) {
        Ok(Some(snapshot)) => snapshot.cookies,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(
                "Could not read session file {}: {}",
                settings.session_file.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Gemini transcriber downloading with the given session cookies.
///
/// Returns `None` when no API key is configured.
pub fn transcriber(
    settings: &Settings,
    config: &Config,
    cookies: &[BrowserCookie],
) -> anyhow::Result<Option<GeminiTranscriber>> {
    let Some(api_key) = api_key_from_env() else {
        return Ok(None);
    };

    let http = HttpClient::with_cookies(
        settings.request_timeout(),
        settings.user_agent.as_deref(),
        cookies,
    )?;
    let transcription = &config.transcription;
    Ok(Some(
        GeminiTranscriber::new(http, Some(api_key))
            .with_model(transcription.model.clone())
            .with_inline_limit(transcription.inline_limit_bytes)
            .with_request_delay(Duration::from_millis(transcription.request_delay_ms)),
    ))
}

/// Shorten a URL for single-line progress output.
pub fn truncate_url(url: &str, max_chars: usize) -> String {
    if url.chars().count() <= max_chars {
        return url.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let tail: String = url
        .chars()
        .rev()
        .take(keep)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{}", tail)
}
