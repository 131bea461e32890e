//! Page text extraction as an ordered list of independent strategies.
//!
//! Every strategy reads the rendered DOM snapshot and returns `None` when it
//! found nothing. [`ContentExtractor`] runs all of them and keeps every
//! non-empty result; the whole-body fallback only runs when the rest came up
//! empty.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::utils::{normalize_whitespace, truncate_chars};

/// Upper bound on extracted text per page.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 50_000;

/// Blocks at or below this many characters are treated as navigation noise.
pub const DEFAULT_MIN_BLOCK_CHARS: usize = 50;

/// Content-area selectors, most specific first.
pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "[role='main']",
    ".content",
    "#content",
    ".container",
    "[class*='asset']",
    "[class*='collection']",
];

const CARD_SELECTOR: &str = "[class*='asset'], [class*='card'], [class*='tile']";
const CARD_TITLE_SELECTOR: &str = "h1, h2, h3, h4, [class*='title'], [class*='name']";
const CARD_DESC_SELECTOR: &str = "p, [class*='description'], [class*='desc']";
const SECTION_SELECTOR: &str = "[class*='section'], [class*='folder']";
const SECTION_HEADER_SELECTOR: &str = "h1, h2, h3";

/// Elements whose text never reaches the reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// A single way of pulling text out of a page.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Text found by this strategy, or `None` if it matched nothing useful.
    fn extract(&self, document: &Html) -> Option<String>;
}

fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Ignoring invalid selector {:?}: {:?}", raw, e);
            None
        }
    }
}

fn parse_selectors<I, S>(raw: I) -> Vec<Selector>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|s| parse_selector(s.as_ref()))
        .collect()
}

/// Whether markup alone keeps the element off screen.
fn is_hidden(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if HIDDEN_TAGS.contains(&el.name()) || el.attr("hidden").is_some() {
        return true;
    }
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    el.attr("style").is_some_and(|style| {
        let style = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if is_hidden(child_el) {
                continue;
            }
            let name = child_el.value().name();
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_visible(child_el, out);
            if block {
                out.push('\n');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Approximation of the browser's `innerText` for an element.
///
/// Skips script-like and hidden elements, breaks lines at block elements
/// and trims each line.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_visible(element, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strategy 1: visible text of content-area elements.
pub struct ContentRegions {
    selectors: Vec<Selector>,
    min_chars: usize,
}

impl ContentRegions {
    pub fn new<I, S>(selectors: I, min_chars: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            selectors: parse_selectors(selectors),
            min_chars,
        }
    }
}

impl Default for ContentRegions {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_SELECTORS.iter(), DEFAULT_MIN_BLOCK_CHARS)
    }
}

impl ExtractionStrategy for ContentRegions {
    fn name(&self) -> &'static str {
        "content_regions"
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();

        for selector in &self.selectors {
            for element in document.select(selector) {
                let text = visible_text(element);
                if text.chars().count() > self.min_chars && seen.insert(text.clone()) {
                    blocks.push(text);
                }
            }
        }

        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join("\n\n"))
        }
    }
}

/// Strategy 2: labelled lines for asset cards and section headers.
pub struct AssetCards {
    card: Option<Selector>,
    card_title: Option<Selector>,
    card_desc: Option<Selector>,
    section: Option<Selector>,
    section_header: Option<Selector>,
}

impl Default for AssetCards {
    fn default() -> Self {
        Self {
            card: parse_selector(CARD_SELECTOR),
            card_title: parse_selector(CARD_TITLE_SELECTOR),
            card_desc: parse_selector(CARD_DESC_SELECTOR),
            section: parse_selector(SECTION_SELECTOR),
            section_header: parse_selector(SECTION_HEADER_SELECTOR),
        }
    }
}

fn first_text(element: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let found = element.select(selector?).next()?;
    let text = visible_text(found);
    (!text.is_empty()).then_some(text)
}

impl ExtractionStrategy for AssetCards {
    fn name(&self) -> &'static str {
        "asset_cards"
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let mut lines = Vec::new();

        if let Some(card) = &self.card {
            for element in document.select(card) {
                if let Some(title) = first_text(element, self.card_title.as_ref()) {
                    lines.push(format!("ASSET: {}", title));
                }
                if let Some(desc) = first_text(element, self.card_desc.as_ref()) {
                    lines.push(format!("DESCRIPCIÓN: {}", desc));
                }
            }
        }

        if let Some(section) = &self.section {
            for element in document.select(section) {
                if let Some(header) = first_text(element, self.section_header.as_ref()) {
                    lines.push(format!("SECCIÓN: {}", header));
                }
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Strategy 3: all visible text in `<body>`.
pub struct BodyText {
    body: Option<Selector>,
}

impl Default for BodyText {
    fn default() -> Self {
        Self {
            body: parse_selector("body"),
        }
    }
}

impl ExtractionStrategy for BodyText {
    fn name(&self) -> &'static str {
        "body_text"
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let text = match &self.body {
            Some(body) => document
                .select(body)
                .next()
                .map(visible_text)
                .unwrap_or_default(),
            None => visible_text(document.root_element()),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Runs the primary strategies in order and concatenates what they find.
pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    fallback: Box<dyn ExtractionStrategy>,
    max_chars: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(
            vec![
                Box::new(ContentRegions::default()),
                Box::new(AssetCards::default()),
            ],
            Box::new(BodyText::default()),
        )
    }
}

impl ContentExtractor {
    pub fn new(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        fallback: Box<dyn ExtractionStrategy>,
    ) -> Self {
        Self {
            strategies,
            fallback,
            max_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    /// Default strategies with custom content selectors and limits.
    pub fn with_settings(selectors: &[String], min_block_chars: usize, max_chars: usize) -> Self {
        let regions = if selectors.is_empty() {
            ContentRegions::new(DEFAULT_CONTENT_SELECTORS.iter(), min_block_chars)
        } else {
            ContentRegions::new(selectors.iter(), min_block_chars)
        };
        Self::new(
            vec![Box::new(regions), Box::new(AssetCards::default())],
            Box::new(BodyText::default()),
        )
        .with_max_chars(max_chars)
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Best-effort text for the page. Never fails; may be empty.
    pub fn extract(&self, document: &Html) -> String {
        let mut parts: Vec<String> = self
            .strategies
            .iter()
            .filter_map(|strategy| {
                let found = strategy.extract(document);
                debug!(
                    "Strategy {} yielded {} chars",
                    strategy.name(),
                    found.as_ref().map_or(0, |t| t.len())
                );
                found
            })
            .filter(|text| !text.trim().is_empty())
            .collect();

        if parts.is_empty() {
            if let Some(text) = self.fallback.extract(document) {
                debug!("Using {} fallback", self.fallback.name());
                parts.push(text);
            }
        }

        let combined = normalize_whitespace(&parts.join("\n\n"));
        truncate_chars(&combined, self.max_chars).to_string()
    }
}

/// Page title from `<title>`, falling back to the first `<h1>`.
pub fn page_title(document: &Html) -> String {
    ["title", "h1"]
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .next()
                .map(visible_text)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_default()
}
