//! Media link discovery from independent DOM signals.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::scrapers::url_utils::resolve_link;
use crate::utils::has_media_extension;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#)
        .unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

/// One place in the DOM where media URLs turn up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSignal {
    /// `<a href>` pointing at a media file.
    Anchors,
    /// `src` of `<video>`, `<audio>` and their `<source>` children.
    PlayerSources,
    /// `data-src`, `data-url` and `data-file` attributes.
    DataAttributes,
    /// Elements labelled as download controls.
    DownloadControls,
    /// `background` inline styles with a `url(...)`.
    BackgroundImages,
    /// Iframes embedding video or audio players.
    EmbeddedFrames,
}

impl MediaSignal {
    pub const ALL: [MediaSignal; 6] = [
        Self::Anchors,
        Self::PlayerSources,
        Self::DataAttributes,
        Self::DownloadControls,
        Self::BackgroundImages,
        Self::EmbeddedFrames,
    ];

    fn selector(&self) -> &'static str {
        match self {
            Self::Anchors => "a[href]",
            Self::PlayerSources => "video[src], audio[src], video source[src], audio source[src]",
            Self::DataAttributes => "[data-src], [data-url], [data-file]",
            Self::DownloadControls => "[class*='download'], [aria-label*='download']",
            Self::BackgroundImages => "[style*='background']",
            Self::EmbeddedFrames => "iframe[src]",
        }
    }

    /// Raw candidate values from one matching element, before resolution.
    fn candidates(&self, element: ElementRef<'_>) -> Vec<String> {
        let attr = |name: &str| element.value().attr(name).map(str::to_string);

        match self {
            Self::Anchors => attr("href")
                .filter(|href| has_media_extension(href))
                .into_iter()
                .collect(),
            Self::PlayerSources => attr("src").into_iter().collect(),
            Self::DataAttributes => ["data-src", "data-url", "data-file"]
                .into_iter()
                .filter_map(attr)
                .filter(|val| has_media_extension(val) || val.contains("download"))
                .collect(),
            Self::DownloadControls => ["href", "data-url"]
                .into_iter()
                .filter_map(attr)
                .collect(),
            Self::BackgroundImages => attr("style")
                .map(|style| {
                    CSS_URL
                        .captures_iter(&style)
                        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
                        .filter(|url| has_media_extension(url))
                        .collect()
                })
                .unwrap_or_default(),
            Self::EmbeddedFrames => attr("src")
                .filter(|src| src.contains("video") || src.contains("audio"))
                .into_iter()
                .collect(),
        }
    }
}

/// Collects media URLs from every [`MediaSignal`] into one set.
pub struct MediaLinkExtractor {
    signals: Vec<(MediaSignal, Selector)>,
}

impl Default for MediaLinkExtractor {
    fn default() -> Self {
        let signals = MediaSignal::ALL
            .iter()
            .filter_map(|signal| match Selector::parse(signal.selector()) {
                Ok(sel) => Some((*signal, sel)),
                Err(e) => {
                    warn!("Media signal {:?} disabled: {:?}", signal, e);
                    None
                }
            })
            .collect();
        Self { signals }
    }
}

impl MediaLinkExtractor {
    /// Absolute media URLs found on the page, deduplicated.
    pub fn extract(&self, document: &Html, page_url: &str) -> BTreeSet<String> {
        let mut media = BTreeSet::new();

        for (signal, selector) in &self.signals {
            let before = media.len();
            for element in document.select(selector) {
                for raw in signal.candidates(element) {
                    if let Some(url) = resolve_link(page_url, &raw) {
                        media.insert(url);
                    }
                }
            }
            if media.len() > before {
                debug!("{:?} added {} media links", signal, media.len() - before);
            }
        }

        media
    }
}
