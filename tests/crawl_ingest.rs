//! End-to-end crawl and ingestion over an in-memory portal.
//!
//! The site serves real HTML, so extraction, link discovery, the session
//! state machine, the crawler and the ingestion coordinator all run as they
//! do against a live portal.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use harvester::knowledge::{KnowledgeStore, MemoryKnowledgeStore};
use harvester::models::{PageResult, SkipReason};
use harvester::scrapers::extract::{extract_links, PageExtractor};
use harvester::scrapers::{
    CrawlOptions, Crawler, Credentials, FetchError, LoginRouteDetector, PortalFetcher,
    SessionCheck, SessionState,
};
use harvester::services::{IngestConfig, IngestionCoordinator, Transcriber, TranscriptionError};
use harvester::utils::MediaKind;

const ROOT: &str = "https://portal.test";
const LOGIN: &str = "https://portal.test/users/sign_in";
const PASSWORD: &str = "correct horse";

fn url(path: &str) -> String {
    format!("{}{}", ROOT, path)
}

struct Page {
    html: String,
    protected: bool,
}

/// Portal that redirects protected pages to a sign-in route.
struct HtmlPortal {
    pages: HashMap<String, Page>,
    extractor: PageExtractor,
    detector: LoginRouteDetector,
    state: SessionState,
    logged_in: bool,
    /// Pages whose first visit finds the session expired.
    expire_on: HashSet<String>,
    logins: usize,
    current: Option<String>,
}

impl HtmlPortal {
    fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            url("/"),
            Page {
                html: r#"<html><head><title>Portal Home</title></head><body>
                    <main><p>Welcome to the resource portal for ministry leaders and their teams.</p>
                    <a href="/library">Library</a> <a href="/team">Team</a>
                    <a href="https://other.test/offsite">Elsewhere</a>
                    <a href="/users/sign_out">Sign out</a></main>
                    </body></html>"#
                    .to_string(),
                protected: false,
            },
        );
        pages.insert(
            url("/library"),
            Page {
                html: r#"<html><head><title>Library</title></head><body>
                    <div class="asset-card"><h3 class="asset-title">Vision Sunday</h3>
                      <p class="asset-description">Message on casting vision.</p>
                      <video src="/media/vision.mp4"></video>
                      <a href="/media/vision.mp4">Download</a></div>
                    <div class="asset-card"><h3 class="asset-title">Launch Guide</h3>
                      <a href="/docs/guide.pdf">PDF</a></div>
                    <a href="/library/sermons">Sermons</a>
                    </body></html>"#
                    .to_string(),
                protected: true,
            },
        );
        pages.insert(
            url("/team"),
            Page {
                html: r#"<html><head><title>Team</title></head><body>
                    <main><p>Church planting cohorts meet monthly to review launch plans together.</p>
                    <a href="/library">Back to library</a></main>
                    </body></html>"#
                    .to_string(),
                protected: true,
            },
        );
        pages.insert(
            url("/library/sermons"),
            Page {
                html: r#"<html><head><title>Sermons</title></head><body>
                    <main><p>Audio archive of Sunday sermons from the last spring season.</p>
                    <audio><source src="/media/sermon.mp3"></audio></main>
                    </body></html>"#
                    .to_string(),
                protected: true,
            },
        );

        Self {
            pages,
            extractor: PageExtractor::default(),
            detector: LoginRouteDetector::default(),
            state: SessionState::new(),
            logged_in: false,
            expire_on: HashSet::new(),
            logins: 0,
            current: None,
        }
    }

    fn try_login(&mut self, creds: &Credentials) -> bool {
        self.logins += 1;
        self.logged_in = creds.password == PASSWORD;
        if self.logged_in {
            self.state.login_succeeded();
            self.current = Some(url("/"));
        } else {
            self.state.login_failed();
            self.current = Some(LOGIN.to_string());
        }
        self.logged_in
    }

    fn login(&mut self, username: &str, password: &str) -> bool {
        let creds = Credentials::new(username, password);
        self.state.begin_login(creds.clone());
        self.try_login(&creds)
    }

    fn current_html(&self) -> Result<(&str, &str), FetchError> {
        let current = self.current.as_deref().ok_or(FetchError::NoPage)?;
        let page = self.pages.get(current).ok_or(FetchError::NoPage)?;
        Ok((current, page.html.as_str()))
    }
}

#[async_trait]
impl PortalFetcher for HtmlPortal {
    async fn ensure_logged_in(&mut self) -> bool {
        let on_login = self.on_login_route().await;
        match self.state.observe(on_login) {
            SessionCheck::Valid => true,
            SessionCheck::NeedsLogin(creds) => self.try_login(&creds),
            SessionCheck::Unrecoverable => false,
        }
    }

    async fn on_login_route(&mut self) -> bool {
        self.current
            .as_deref()
            .is_some_and(|u| self.detector.is_login_route(u))
    }

    async fn navigate(&mut self, target: &str, _timeout: Duration) -> Result<(), FetchError> {
        let Some(page) = self.pages.get(target) else {
            return Err(FetchError::Navigation {
                url: target.to_string(),
                message: "404 Not Found".to_string(),
            });
        };
        if self.expire_on.remove(target) {
            self.logged_in = false;
        }
        self.current = Some(if page.protected && !self.logged_in {
            LOGIN.to_string()
        } else {
            target.to_string()
        });
        Ok(())
    }

    async fn scrape(&mut self) -> Result<PageResult, FetchError> {
        let (current, html) = self.current_html()?;
        Ok(self.extractor.extract(html, current))
    }

    async fn links(&mut self) -> Result<Vec<String>, FetchError> {
        let (current, html) = self.current_html()?;
        Ok(extract_links(html, current))
    }

    async fn current_url(&mut self) -> Option<String> {
        self.current.clone()
    }
}

#[derive(Default)]
struct EchoTranscriber {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Transcriber for EchoTranscriber {
    fn name(&self) -> &str {
        "echo"
    }

    async fn transcribe(&self, url: &str, mime_type: &str) -> Result<String, TranscriptionError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), mime_type.to_string()));
        Ok(format!("## Notes\nSpoken content of {}", url))
    }
}

fn crawler() -> Crawler {
    Crawler::new(CrawlOptions::new(2, 10).with_polite_delay(Duration::ZERO))
}

#[tokio::test]
async fn authenticated_crawl_feeds_the_knowledge_store() {
    let mut portal = HtmlPortal::new();
    portal.expire_on.insert(url("/team"));
    assert!(portal.login("leader@church.test", PASSWORD));

    let report = crawler().crawl(&mut portal, &url("/")).await;

    let visited: Vec<&str> = report.page_results().map(|p| p.url.as_str()).collect();
    assert_eq!(
        visited,
        vec![
            url("/").as_str(),
            url("/library").as_str(),
            url("/team").as_str(),
            url("/library/sermons").as_str()
        ]
    );
    assert!(report.errors.is_empty());
    assert!(report.skipped.is_empty());
    assert_eq!(portal.logins, 2, "expired session should be renewed once");

    let media = report.media_links();
    let expected: BTreeSet<String> = [
        url("/docs/guide.pdf"),
        url("/media/sermon.mp3"),
        url("/media/vision.mp4"),
    ]
    .into_iter()
    .collect();
    assert_eq!(media, expected);

    let library = &report.pages[1].page;
    assert_eq!(library.title, "Library");
    assert!(library.content.contains("ASSET: Vision Sunday"));

    let store = Arc::new(MemoryKnowledgeStore::new());
    let transcriber = Arc::new(EchoTranscriber::default());
    let coordinator = IngestionCoordinator::new(
        store.clone(),
        IngestConfig {
            topic: Some("church planting".to_string()),
            ..Default::default()
        },
    )
    .with_transcriber(transcriber.clone());

    let summary = coordinator.run(&report).await;
    assert_eq!(summary.pages_visited, 4);
    assert_eq!(summary.pages_indexed, 4);
    assert_eq!(summary.priority_pages, 1);
    assert_eq!(summary.media_found.get(&MediaKind::Video), Some(&1));
    assert_eq!(summary.media_found.get(&MediaKind::Audio), Some(&1));
    assert_eq!(summary.media_found.get(&MediaKind::Pdf), Some(&1));
    assert_eq!(summary.media_transcribed, 2);
    assert_eq!(summary.total_errors(), 0);

    let calls = transcriber.calls.lock().unwrap().clone();
    assert!(calls.contains(&(url("/media/vision.mp4"), "video/mp4".to_string())));
    assert!(calls.contains(&(url("/media/sermon.mp3"), "audio/mpeg".to_string())));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.documents, 6);

    let hits = store.search("spoken content", 10).await.unwrap();
    assert_eq!(hits.len(), 2);

    // A second run over the same crawl adds nothing.
    let again = coordinator.run(&report).await;
    assert_eq!(again.pages_indexed, 0);
    assert_eq!(again.pages_known, 4);
    assert_eq!(again.media_known, 2);
    assert_eq!(transcriber.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_login_still_indexes_public_pages() {
    let mut portal = HtmlPortal::new();
    assert!(!portal.login("leader@church.test", "wrong"));

    let report = crawler().crawl(&mut portal, &url("/")).await;

    // The browser starts on the sign-in page, yet the public home page is
    // still crawled.
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].page.url, url("/"));
    assert_eq!(report.skipped_for(SkipReason::AuthRequired), 2);
    assert_eq!(portal.logins, 1, "a failed login is not retried");

    let store = Arc::new(MemoryKnowledgeStore::new());
    let coordinator = IngestionCoordinator::new(store.clone(), IngestConfig::default());
    let summary = coordinator.run(&report).await;

    assert_eq!(summary.pages_indexed, 1);
    assert_eq!(summary.crawl_skips, 2);
    assert_eq!(store.sources(), vec![url("/")]);
}
