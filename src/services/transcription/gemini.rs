//! Google Gemini transcription backend.
//!
//! Media is downloaded with the portal session's cookies, then sent inline
//! to the `generateContent` endpoint. Requires `GEMINI_API_KEY` (or
//! `GOOGLE_API_KEY`).
//!
//! Rate limiting:
//! - `request_delay` is slept before every request (default 200ms)
//! - 429 responses are retried with exponential backoff
//! - a `Retry-After` header takes precedence over the backoff

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{backoff_delay, parse_retry_after, Transcriber, TranscriptionError};
use crate::scrapers::{DownloadError, HttpClient};

/// Maximum retry attempts on rate limit errors.
const MAX_RETRIES: u32 = 5;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Largest file sent as `inline_data`.
pub const DEFAULT_INLINE_LIMIT: u64 = 20 * 1024 * 1024;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const TRANSCRIPTION_PROMPT: &str = "Listen/Watch this media carefully. Provide a detailed transcription and summary of the content. Extract key insights, biblical references, and leadership principles. Format as Markdown.";

pub struct GeminiTranscriber {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    inline_limit: u64,
    request_delay: Duration,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiRequest {
    fn transcription(mime_type: &str, media: &[u8]) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: TRANSCRIPTION_PROMPT.to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(media),
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.2,
                max_output_tokens: 8192,
            },
        }
    }
}

impl GeminiResponse {
    /// Text of the first candidate, all parts joined.
    fn into_text(self) -> Result<String, TranscriptionError> {
        if let Some(error) = self.error {
            return Err(TranscriptionError::Api(error.message));
        }

        Ok(self
            .candidates
            .and_then(|c| c.into_iter().next())
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}

/// API key from the environment, preferring `GEMINI_API_KEY`.
pub fn api_key_from_env() -> Option<String> {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

impl GeminiTranscriber {
    /// Create a transcriber that downloads through `http`.
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            inline_limit: DEFAULT_INLINE_LIMIT,
            request_delay: Duration::from_millis(200),
        }
    }

    /// Create a transcriber with the API key taken from the environment.
    pub fn from_env(http: HttpClient) -> Self {
        Self::new(http, api_key_from_env())
    }

    /// Set the model (e.g., "gemini-1.5-flash", "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_inline_limit(mut self, limit: u64) -> Self {
        self.inline_limit = limit;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TranscriptionError> {
        let file = tempfile::NamedTempFile::new()?;
        match self.http.download_to(url, file.path(), self.inline_limit).await {
            Ok(_) => {}
            Err(DownloadError::TooLarge { limit }) => {
                return Err(TranscriptionError::TooLarge { limit })
            }
            Err(e) => return Err(e.into()),
        }
        Ok(tokio::fs::read(file.path()).await?)
    }

    async fn generate(
        &self,
        api_key: &str,
        request: &GeminiRequest,
    ) -> Result<String, TranscriptionError> {
        let url = format!("{}/{}:generateContent?key={}", API_BASE, self.model, api_key);

        if self.request_delay > Duration::ZERO {
            debug!("Gemini: waiting {:?} before request", self.request_delay);
            tokio::time::sleep(self.request_delay).await;
        }

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .client()
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| TranscriptionError::Api(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let retry_after_secs = retry_after.as_deref().and_then(|s| s.parse::<u64>().ok());

                if attempt >= MAX_RETRIES {
                    return Err(TranscriptionError::RateLimited { retry_after_secs });
                }

                let wait = parse_retry_after(retry_after.as_deref())
                    .unwrap_or_else(|| backoff_delay(attempt, 1000));
                warn!(
                    "Gemini rate limited (attempt {}), waiting {:?}",
                    attempt + 1,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TranscriptionError::Api(format!(
                    "Gemini API error ({}): {}",
                    status, body
                )));
            }

            let parsed: GeminiResponse = response
                .json()
                .await
                .map_err(|e| TranscriptionError::Api(format!("Failed to parse response: {}", e)))?;
            return parsed.into_text();
        }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(&self, url: &str, mime_type: &str) -> Result<String, TranscriptionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            TranscriptionError::NotAvailable(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let media = self.download(url).await?;
        info!(
            "Transcribing {} ({} bytes, {}) with {}",
            url,
            media.len(),
            mime_type,
            self.model
        );

        let request = GeminiRequest::transcription(mime_type, &media);
        self.generate(api_key, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_inline_media() {
        let request = GeminiRequest::transcription("audio/mpeg", b"abc");
        let json = serde_json::to_value(&request).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], TRANSCRIPTION_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/mpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r##"{"candidates":[{"content":{"parts":[{"text":"# Talk\n"},{"text":"Summary"}]}}]}"##,
        )
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "# Talk\nSummary");
    }

    #[test]
    fn response_error_is_reported() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"error":{"message":"quota exceeded"}}"#).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(TranscriptionError::Api(msg)) if msg == "quota exceeded"
        ));
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(response.into_text().unwrap(), "");
    }

    #[tokio::test]
    async fn missing_api_key_is_not_available() {
        let http = HttpClient::new(Duration::from_secs(5), None).unwrap();
        let transcriber = GeminiTranscriber::new(http, None);
        assert!(!transcriber.is_available());

        let result = transcriber
            .transcribe("https://cdn.portal.test/talk.mp3", "audio/mpeg")
            .await;
        assert!(matches!(result, Err(TranscriptionError::NotAvailable(_))));
    }
}
