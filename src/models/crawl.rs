//! Crawl models: frontier entries, per-page results and the run report.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A frontier entry waiting to be visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub url: String,
    pub depth: u32,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    /// Seed entry at depth zero.
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, 0)
    }

    /// Child entry one level below this one.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.depth + 1)
    }
}

/// Output of fetching and extracting a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub title: String,
    pub content: String,
    pub url: String,
    /// Deduplicated media URLs found on the page.
    pub media_links: BTreeSet<String>,
}

impl PageResult {
    /// Empty result for a page where extraction produced nothing.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// A page visited during a crawl, tagged with the depth it was found at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledPage {
    pub depth: u32,
    pub page: PageResult,
}

/// Why a frontier entry was dequeued (or left behind) without producing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Entry was deeper than the configured maximum.
    DepthExceeded,
    /// Portal kept redirecting to a login route.
    AuthRequired,
    /// Crawl stopped at `max_pages` with the entry still queued.
    PageBudgetExhausted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepthExceeded => "depth_exceeded",
            Self::AuthRequired => "auth_required",
            Self::PageBudgetExhausted => "page_budget_exhausted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub target: CrawlTarget,
    pub reason: SkipReason,
}

/// A page whose fetch or extraction failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub target: CrawlTarget,
    pub message: String,
}

/// Everything a crawl run produced, in visitation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    pub pages: Vec<CrawledPage>,
    /// Normalized URLs in the order they were dequeued and marked visited.
    pub visited: Vec<String>,
    pub skipped: Vec<SkippedTarget>,
    pub errors: Vec<CrawlFailure>,
}

impl CrawlReport {
    /// Page results without depth information.
    pub fn page_results(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().map(|p| &p.page)
    }

    /// Union of media links across all pages.
    pub fn media_links(&self) -> BTreeSet<String> {
        self.page_results()
            .flat_map(|p| p.media_links.iter().cloned())
            .collect()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

/// Progress event emitted while a crawl is running.
#[derive(Debug)]
pub enum CrawlEvent<'a> {
    Visiting(&'a CrawlTarget),
    Page(&'a CrawledPage),
    Skipped(&'a SkippedTarget),
    Failed(&'a CrawlFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_increments_depth() {
        let seed = CrawlTarget::seed("https://portal.test/");
        let child = seed.child("https://portal.test/a");
        assert_eq!(child.depth, 1);
        assert_eq!(child.child("https://portal.test/b").depth, 2);
    }

    #[test]
    fn report_merges_media_links() {
        let mut first = PageResult::empty("https://portal.test/a");
        first.media_links.insert("https://cdn.test/x.mp4".to_string());
        let mut second = PageResult::empty("https://portal.test/b");
        second.media_links.insert("https://cdn.test/x.mp4".to_string());
        second.media_links.insert("https://cdn.test/y.pdf".to_string());

        let report = CrawlReport {
            pages: vec![
                CrawledPage {
                    depth: 0,
                    page: first,
                },
                CrawledPage {
                    depth: 1,
                    page: second,
                },
            ],
            ..Default::default()
        };

        assert_eq!(report.media_links().len(), 2);
    }

    #[test]
    fn whitespace_only_content_is_empty() {
        let mut page = PageResult::empty("https://portal.test/");
        page.content = "  \n\n ".to_string();
        assert!(!page.has_content());
    }
}
