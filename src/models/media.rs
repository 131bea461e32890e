//! Media assets discovered while crawling.

use serde::{Deserialize, Serialize};

use crate::utils::{file_name_from_url, media_kind_for_url, mime_for_url, MediaKind};

/// A media URL and the kind inferred from its extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaAsset {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaAsset {
    /// Classify a media URL.
    pub fn classify(url: &str) -> Self {
        Self {
            url: url.to_string(),
            kind: media_kind_for_url(url),
        }
    }

    /// MIME type handed to the transcriber.
    pub fn mime_type(&self) -> String {
        mime_for_url(&self.url)
    }

    /// File name shown in titles and progress output.
    pub fn file_name(&self) -> String {
        file_name_from_url(&self.url)
    }

    /// Title used when the transcript is indexed.
    pub fn document_title(&self) -> String {
        format!("Media: {}", self.file_name())
    }

    /// Document content wrapping a transcript.
    pub fn transcript_document(&self, transcript: &str) -> String {
        format!("TRANSCRIPT OF {}:\n\n{}", self.url, transcript.trim())
    }
}
