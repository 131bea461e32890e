//! Media kind classification from URL file extensions.

use serde::{Deserialize, Serialize};

/// Media kinds routed differently during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Pdf,
    Other,
}

impl MediaKind {
    /// Get the kind ID as a string.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Pdf => "pdf",
            Self::Other => "other",
        }
    }

    /// Get the display name for the kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Pdf => "PDF",
            Self::Other => "Other",
        }
    }

    /// Parse a kind from its string ID.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "pdf" => Some(Self::Pdf),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Classify a lower-case file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "mp4" | "mov" | "webm" | "avi" | "m4v" | "mkv" => Self::Video,
            "mp3" | "wav" | "m4a" | "ogg" | "aac" | "flac" => Self::Audio,
            "pdf" => Self::Pdf,
            _ => Self::Other,
        }
    }

    /// Whether assets of this kind can be handed to a transcriber.
    pub fn is_transcribable(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }

    /// MIME type used when an extension gives no better answer.
    pub fn fallback_mime(&self) -> &'static str {
        match self {
            Self::Video => "video/mp4",
            Self::Audio => "audio/mpeg",
            Self::Pdf => "application/pdf",
            Self::Other => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// File extensions that mark a link as a downloadable media asset.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mp3", "mov", "wav", "m4a", "pdf", "doc", "docx", "ppt", "pptx", "webm", "avi", "ogg",
];

/// Lower-case extension of the last path segment, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check if a URL points at a file with one of [`MEDIA_EXTENSIONS`].
pub fn has_media_extension(url: &str) -> bool {
    url_extension(url).is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Classify a URL by its extension.
pub fn media_kind_for_url(url: &str) -> MediaKind {
    url_extension(url)
        .map(|ext| MediaKind::from_extension(&ext))
        .unwrap_or(MediaKind::Other)
}

/// Best-guess MIME type for a media URL.
pub fn mime_for_url(url: &str) -> String {
    let kind = media_kind_for_url(url);
    url_extension(url)
        .and_then(|ext| mime_guess::from_ext(&ext).first())
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| kind.fallback_mime().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_extension() {
        assert_eq!(
            url_extension("https://cdn.test/a/Video.MP4"),
            Some("mp4".to_string())
        );
        assert_eq!(
            url_extension("https://cdn.test/a/talk.mp3?X-Goog-Signature=abc#t=10"),
            Some("mp3".to_string())
        );
        assert_eq!(url_extension("https://cdn.test/folder/"), None);
        assert_eq!(url_extension("https://cdn.test/download"), None);
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(media_kind_for_url("https://x.test/a.mov"), MediaKind::Video);
        assert_eq!(media_kind_for_url("https://x.test/a.m4a"), MediaKind::Audio);
        assert_eq!(media_kind_for_url("https://x.test/a.ogg"), MediaKind::Audio);
        assert_eq!(media_kind_for_url("https://x.test/a.pdf"), MediaKind::Pdf);
        assert_eq!(media_kind_for_url("https://x.test/a.pptx"), MediaKind::Other);
        assert_eq!(
            media_kind_for_url("https://x.test/embed/video/123"),
            MediaKind::Other
        );
    }

    #[test]
    fn test_has_media_extension() {
        assert!(has_media_extension("https://x.test/guide.PDF"));
        assert!(has_media_extension("https://x.test/deck.pptx?dl=1"));
        assert!(!has_media_extension("https://x.test/image.png"));
        assert!(!has_media_extension("https://x.test/page"));
    }

    #[test]
    fn test_mime_for_url() {
        assert_eq!(mime_for_url("https://x.test/a.mp4"), "video/mp4");
        assert_eq!(mime_for_url("https://x.test/a.pdf"), "application/pdf");
        assert_eq!(mime_for_url("https://x.test/stream"), "application/octet-stream");
    }

    #[test]
    fn test_from_id() {
        assert_eq!(MediaKind::from_id("VIDEO"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_id("image"), None);
    }
}
