//! Content Extractor: turns a rendered DOM snapshot into a [`PageResult`].
//!
//! Extraction never fails. A page that is half-loaded or malformed still
//! produces whatever text and media the strategies could find.

mod content;
mod media;

pub use content::{
    page_title, visible_text, AssetCards, BodyText, ContentExtractor, ContentRegions,
    ExtractionStrategy, DEFAULT_CONTENT_SELECTORS, DEFAULT_MAX_CONTENT_CHARS,
    DEFAULT_MIN_BLOCK_CHARS,
};
pub use media::{MediaLinkExtractor, MediaSignal};

use scraper::{Html, Selector};

use crate::models::PageResult;
use crate::scrapers::url_utils::resolve_link;

/// Text, title and media extraction for one page.
#[derive(Default)]
pub struct PageExtractor {
    content: ContentExtractor,
    media: MediaLinkExtractor,
}

impl PageExtractor {
    pub fn new(content: ContentExtractor) -> Self {
        Self {
            content,
            media: MediaLinkExtractor::default(),
        }
    }

    /// Extract a page result from serialized HTML.
    pub fn extract(&self, html: &str, url: &str) -> PageResult {
        let document = Html::parse_document(html);
        let title = page_title(&document);

        PageResult {
            title: if title.is_empty() {
                url.to_string()
            } else {
                title
            },
            content: self.content.extract(&document),
            url: url.to_string(),
            media_links: self.media.extract(&document, url),
        }
    }
}

/// Absolute targets of every `<a href>` on the page, in document order.
pub fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(page_url, href))
        .collect()
}
