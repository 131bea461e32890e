//! Transcription of discovered audio and video.
//!
//! Transcription is best-effort: every failure is a [`TranscriptionError`]
//! the ingestion coordinator logs and counts, never a reason to stop a batch.

mod gemini;

pub use gemini::{api_key_from_env, GeminiTranscriber, DEFAULT_GEMINI_MODEL, DEFAULT_INLINE_LIMIT};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::scrapers::DownloadError;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription backend not available: {0}")]
    NotAvailable(String),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("transcription API error: {0}")]
    Api(String),

    #[error("rate limited after retries (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("media exceeds the {limit} byte inline limit")]
    TooLarge { limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Transcribe the media at `url`.
    async fn transcribe(&self, url: &str, mime_type: &str) -> Result<String, TranscriptionError>;
}

/// Parse a `Retry-After` header given in seconds, capped at one minute.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}

/// Exponential backoff for the given attempt, capped at one minute.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_capped() {
        assert_eq!(parse_retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(Some("600")), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn backoff_doubles_until_cap() {
        assert_eq!(backoff_delay(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3, 1000), Duration::from_millis(8000));
        assert_eq!(backoff_delay(10, 1000), Duration::from_secs(60));
        assert_eq!(backoff_delay(80, 1000), Duration::from_secs(60));
    }
}
