//! Breadth-first frontier crawler over an authenticated portal.
//!
//! Pages are visited one at a time in FIFO order. A page that fails is
//! recorded and the crawl moves on; only the page budget and the frontier
//! running dry end a run.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::fetcher::PortalFetcher;
use super::url_utils::{host_of, is_logout_url, is_same_domain, normalize_url};
use crate::models::{
    CrawlEvent, CrawlFailure, CrawlReport, CrawlTarget, CrawledPage, PageResult, SkipReason,
    SkippedTarget,
};
use crate::utils::has_media_extension;

/// Default per-navigation timeout in seconds.
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 15;

/// Default pause after each navigation in milliseconds.
pub const DEFAULT_POLITE_DELAY_MS: u64 = 1000;

/// Bounds and pacing for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_depth: u32,
    /// Upper bound on pages visited (attempted). Zero is treated as one.
    pub max_pages: usize,
    pub page_timeout: Duration,
    pub polite_delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            page_timeout: Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            polite_delay: Duration::from_millis(DEFAULT_POLITE_DELAY_MS),
        }
    }
}

impl CrawlOptions {
    pub fn new(max_depth: u32, max_pages: usize) -> Self {
        Self {
            max_depth,
            max_pages,
            ..Default::default()
        }
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_polite_delay(mut self, delay: Duration) -> Self {
        self.polite_delay = delay;
        self
    }
}

/// Frontier crawler. Borrows a fetcher for the duration of each run.
#[derive(Debug, Clone, Default)]
pub struct Crawler {
    options: CrawlOptions,
}

/// Frontier plus the membership sets guarding it.
struct Frontier {
    queue: VecDeque<CrawlTarget>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    fn new(seed: CrawlTarget) -> Self {
        let mut queued = HashSet::new();
        queued.insert(seed.url.clone());
        Self {
            queue: VecDeque::from([seed]),
            queued,
            visited: HashSet::new(),
        }
    }

    fn offer(&mut self, target: CrawlTarget) -> bool {
        if self.visited.contains(&target.url) || !self.queued.insert(target.url.clone()) {
            return false;
        }
        self.queue.push_back(target);
        true
    }
}

impl Crawler {
    pub fn new(options: CrawlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawl from `seed_url` without progress reporting.
    pub async fn crawl<F>(&self, fetcher: &mut F, seed_url: &str) -> CrawlReport
    where
        F: PortalFetcher + ?Sized,
    {
        self.crawl_with_observer(fetcher, seed_url, |_| {}).await
    }

    /// Crawl from `seed_url`, reporting each event to `observer` as it happens.
    pub async fn crawl_with_observer<F, O>(
        &self,
        fetcher: &mut F,
        seed_url: &str,
        mut observer: O,
    ) -> CrawlReport
    where
        F: PortalFetcher + ?Sized,
        O: FnMut(&CrawlEvent<'_>) + Send,
    {
        let mut report = CrawlReport::default();
        let max_pages = self.options.max_pages.max(1);
        let max_depth = self.options.max_depth;

        let (seed, allowed_host) = match normalize_url(seed_url)
            .and_then(|url| host_of(&url).map(|host| (url, host)))
        {
            Some(pair) => pair,
            None => {
                let failure = CrawlFailure {
                    target: CrawlTarget::seed(seed_url),
                    message: "seed URL is not an absolute URL".to_string(),
                };
                observer(&CrawlEvent::Failed(&failure));
                report.errors.push(failure);
                return report;
            }
        };

        info!(
            "Crawling {} (max depth {}, max pages {})",
            seed, max_depth, max_pages
        );

        let frontier = Frontier::new(CrawlTarget::seed(seed));
        self.drive(fetcher, frontier, &allowed_host, &mut report, &mut observer)
            .await;

        info!(
            "Crawl finished: {} pages, {} skipped, {} errors",
            report.pages.len(),
            report.skipped.len(),
            report.errors.len()
        );

        report
    }

    /// Work the frontier until it runs dry or the page budget is spent.
    async fn drive<F, O>(
        &self,
        fetcher: &mut F,
        mut frontier: Frontier,
        allowed_host: &str,
        report: &mut CrawlReport,
        observer: &mut O,
    ) where
        F: PortalFetcher + ?Sized,
        O: FnMut(&CrawlEvent<'_>) + Send,
    {
        let max_pages = self.options.max_pages.max(1);
        let max_depth = self.options.max_depth;

        while report.visited.len() < max_pages {
            let Some(target) = frontier.queue.pop_front() else {
                break;
            };

            if frontier.visited.contains(&target.url) {
                continue;
            }
            // Expansion stops at the depth bound, so only an entry queued
            // from outside the walk can get here.
            if target.depth > max_depth {
                let skipped = SkippedTarget {
                    target,
                    reason: SkipReason::DepthExceeded,
                };
                observer(&CrawlEvent::Skipped(&skipped));
                report.skipped.push(skipped);
                continue;
            }

            frontier.visited.insert(target.url.clone());
            report.visited.push(target.url.clone());
            observer(&CrawlEvent::Visiting(&target));

            match self.visit(fetcher, &target).await {
                Visit::Page(page) => {
                    if target.depth < max_depth {
                        self.expand(fetcher, &target, allowed_host, &mut frontier)
                            .await;
                    }
                    let crawled = CrawledPage {
                        depth: target.depth,
                        page,
                    };
                    observer(&CrawlEvent::Page(&crawled));
                    report.pages.push(crawled);
                }
                Visit::AuthRequired => {
                    let skipped = SkippedTarget {
                        target,
                        reason: SkipReason::AuthRequired,
                    };
                    observer(&CrawlEvent::Skipped(&skipped));
                    report.skipped.push(skipped);
                }
                Visit::Failed(message) => {
                    warn!("Error crawling {}: {}", target.url, message);
                    let failure = CrawlFailure { target, message };
                    observer(&CrawlEvent::Failed(&failure));
                    report.errors.push(failure);
                }
            }
        }

        for target in frontier.queue.drain(..) {
            if frontier.visited.contains(&target.url) {
                continue;
            }
            let skipped = SkippedTarget {
                target,
                reason: SkipReason::PageBudgetExhausted,
            };
            observer(&CrawlEvent::Skipped(&skipped));
            report.skipped.push(skipped);
        }
    }

    async fn visit<F>(&self, fetcher: &mut F, target: &CrawlTarget) -> Visit
    where
        F: PortalFetcher + ?Sized,
    {
        info!("Crawling: {} (depth {})", target.url, target.depth);

        // Public pages stay reachable without a session, so a failed check
        // only matters if the target itself lands on a login route.
        let session_usable = fetcher.ensure_logged_in().await;
        if !session_usable {
            debug!("No usable session before opening {}", target.url);
        }

        if let Err(e) = fetcher.navigate(&target.url, self.options.page_timeout).await {
            return Visit::Failed(e.to_string());
        }

        if fetcher.on_login_route().await {
            debug!("Redirected to login while opening {}", target.url);
            if !session_usable || !fetcher.ensure_logged_in().await {
                return Visit::AuthRequired;
            }
            if let Err(e) = fetcher.navigate(&target.url, self.options.page_timeout).await {
                return Visit::Failed(e.to_string());
            }
            if fetcher.on_login_route().await {
                return Visit::AuthRequired;
            }
        }

        if !self.options.polite_delay.is_zero() {
            tokio::time::sleep(self.options.polite_delay).await;
        }

        match fetcher.scrape().await {
            Ok(page) => Visit::Page(page),
            Err(e) => Visit::Failed(e.to_string()),
        }
    }

    async fn expand<F: PortalFetcher + ?Sized>(
        &self,
        fetcher: &mut F,
        parent: &CrawlTarget,
        allowed_host: &str,
        frontier: &mut Frontier,
    ) {
        let links = match fetcher.links().await {
            Ok(links) => links,
            Err(e) => {
                warn!("Could not list links on {}: {}", parent.url, e);
                return;
            }
        };

        let mut added = 0;
        for link in links {
            let Some(url) = normalize_url(&link) else {
                continue;
            };
            if !is_same_domain(&url, allowed_host) || is_logout_url(&url) {
                continue;
            }
            // Files are collected as media, not crawled as pages.
            if has_media_extension(&url) {
                continue;
            }
            if frontier.offer(parent.child(url)) {
                added += 1;
            }
        }
        debug!("Queued {} links from {}", added, parent.url);
    }
}

enum Visit {
    Page(PageResult),
    AuthRequired,
    Failed(String),
}
