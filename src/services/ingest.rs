//! Ingestion coordinator.
//!
//! Decides, per crawled page and per discovered media asset, what goes into
//! the knowledge store. Every per-item failure is logged and counted; a run
//! always ends with an [`IngestReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::topic::TopicMatcher;
use super::transcription::Transcriber;
use crate::knowledge::{self, format_search_results, KnowledgeStore};
use crate::models::{CrawlReport, IndexedDocument, MediaAsset, PageResult, DEFAULT_CHUNK_SIZE};
use crate::utils::MediaKind;

/// Events emitted while ingesting.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    PageIndexed { source: String, priority: bool },
    PageKnown { source: String },
    PageFiltered { source: String },
    Transcribing { url: String },
    MediaIndexed { url: String },
    MediaKnown { url: String },
    MediaFailed { url: String, error: String },
}

/// Configuration for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub chunk_size: usize,
    /// Topic used to flag priority pages.
    pub topic: Option<String>,
    /// Index non-priority pages as well.
    pub learn_everything: bool,
    /// Hand audio and video to the transcriber.
    pub transcribe_media: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            topic: None,
            learn_everything: true,
            transcribe_media: true,
        }
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages_visited: usize,
    pub pages_indexed: usize,
    pub pages_known: usize,
    pub pages_filtered: usize,
    pub pages_empty: usize,
    pub priority_pages: usize,
    pub crawl_skips: usize,
    pub crawl_errors: usize,
    pub media_found: BTreeMap<MediaKind, usize>,
    pub media_transcribed: usize,
    pub media_known: usize,
    pub media_failed: usize,
    pub ingest_errors: usize,
}

impl IngestReport {
    /// Start a report from a finished crawl.
    pub fn from_crawl(crawl: &CrawlReport) -> Self {
        Self {
            pages_visited: crawl.visited.len(),
            crawl_skips: crawl.skipped.len(),
            crawl_errors: crawl.errors.len(),
            ..Default::default()
        }
    }

    pub fn total_media(&self) -> usize {
        self.media_found.values().sum()
    }

    pub fn total_errors(&self) -> usize {
        self.crawl_errors + self.media_failed + self.ingest_errors
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pages visited:     {}", self.pages_visited)?;
        writeln!(f, "Pages indexed:     {}", self.pages_indexed)?;
        writeln!(f, "Already known:     {}", self.pages_known)?;
        if self.priority_pages > 0 || self.pages_filtered > 0 {
            writeln!(f, "Priority pages:    {}", self.priority_pages)?;
            writeln!(f, "Filtered pages:    {}", self.pages_filtered)?;
        }
        if self.pages_empty > 0 {
            writeln!(f, "Empty pages:       {}", self.pages_empty)?;
        }
        writeln!(f, "Crawl skips:       {}", self.crawl_skips)?;
        write!(f, "Media found:       {}", self.total_media())?;
        let kinds: Vec<String> = self
            .media_found
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        if !kinds.is_empty() {
            write!(f, " ({})", kinds.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "Media transcribed: {}", self.media_transcribed)?;
        if self.media_known > 0 {
            writeln!(f, "Media known:       {}", self.media_known)?;
        }
        write!(f, "Errors:            {}", self.total_errors())
    }
}

/// Service that turns crawl output into knowledge documents.
pub struct IngestionCoordinator {
    store: Arc<dyn KnowledgeStore>,
    transcriber: Option<Arc<dyn Transcriber>>,
    config: IngestConfig,
    topic: Option<TopicMatcher>,
    events: Option<mpsc::Sender<IngestEvent>>,
}

impl IngestionCoordinator {
    pub fn new(store: Arc<dyn KnowledgeStore>, config: IngestConfig) -> Self {
        let topic = config
            .topic
            .as_deref()
            .map(TopicMatcher::new)
            .filter(|m| !m.is_empty());
        Self {
            store,
            transcriber: None,
            config,
            topic,
            events: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<IngestEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    async fn emit(&self, event: IngestEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Index `content` under `source` unless the store already knows it.
    ///
    /// Returns `false` when the source was already present.
    pub async fn add_document(
        &self,
        content: &str,
        source: &str,
        title: &str,
    ) -> knowledge::Result<bool> {
        if self.store.exists(source).await? {
            debug!("Skipping {}: already indexed", source);
            return Ok(false);
        }

        let document = IndexedDocument::new(source, title, content, self.config.chunk_size);
        let chunks = document.chunks.len();
        let added = self.store.add(document).await?;
        if added {
            debug!("Indexed {} ({} chunks)", source, chunks);
        }
        Ok(added)
    }

    /// Whether a page matches the configured topic.
    pub fn is_priority(&self, page: &PageResult) -> bool {
        self.topic.as_ref().is_some_and(|topic| {
            topic.matches(&page.title) || topic.matches(&page.content)
        })
    }

    /// Index crawled pages, priority pages first.
    pub async fn ingest_pages<'a, I>(&self, pages: I, report: &mut IngestReport)
    where
        I: IntoIterator<Item = &'a PageResult>,
    {
        let (priority, rest): (Vec<&PageResult>, Vec<&PageResult>) =
            pages.into_iter().partition(|page| self.is_priority(page));
        report.priority_pages += priority.len();

        let index_rest = self.topic.is_none() || self.config.learn_everything;

        for page in priority {
            self.ingest_page(page, true, report).await;
        }
        for page in rest {
            if index_rest {
                self.ingest_page(page, false, report).await;
            } else {
                debug!("Filtered {}: does not match topic", page.url);
                report.pages_filtered += 1;
                self.emit(IngestEvent::PageFiltered {
                    source: page.url.clone(),
                })
                .await;
            }
        }
    }

    async fn ingest_page(&self, page: &PageResult, priority: bool, report: &mut IngestReport) {
        if !page.has_content() {
            debug!("Skipping {}: no content extracted", page.url);
            report.pages_empty += 1;
            return;
        }

        match self.add_document(&page.content, &page.url, &page.title).await {
            Ok(true) => {
                report.pages_indexed += 1;
                self.emit(IngestEvent::PageIndexed {
                    source: page.url.clone(),
                    priority,
                })
                .await;
            }
            Ok(false) => {
                report.pages_known += 1;
                self.emit(IngestEvent::PageKnown {
                    source: page.url.clone(),
                })
                .await;
            }
            Err(e) => {
                warn!("Failed to index {}: {}", page.url, e);
                report.ingest_errors += 1;
            }
        }
    }

    /// Classify media links and index transcripts of audio and video.
    pub async fn ingest_media(&self, links: &BTreeSet<String>, report: &mut IngestReport) {
        let assets: Vec<MediaAsset> = links.iter().map(|url| MediaAsset::classify(url)).collect();
        for asset in &assets {
            *report.media_found.entry(asset.kind).or_insert(0) += 1;
        }

        let transcriber = match &self.transcriber {
            Some(t) if self.config.transcribe_media => t,
            _ => return,
        };

        for asset in assets.iter().filter(|a| a.kind.is_transcribable()) {
            self.ingest_asset(&**transcriber, asset, report).await;
        }
    }

    async fn ingest_asset(
        &self,
        transcriber: &dyn Transcriber,
        asset: &MediaAsset,
        report: &mut IngestReport,
    ) {
        match self.store.exists(&asset.url).await {
            Ok(true) => {
                debug!("Skipping {}: transcript already indexed", asset.url);
                report.media_known += 1;
                self.emit(IngestEvent::MediaKnown {
                    url: asset.url.clone(),
                })
                .await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to check {}: {}", asset.url, e);
                report.ingest_errors += 1;
                return;
            }
        }

        self.emit(IngestEvent::Transcribing {
            url: asset.url.clone(),
        })
        .await;

        let transcript = match transcriber.transcribe(&asset.url, &asset.mime_type()).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                self.media_failed(asset, "empty transcript".to_string(), report)
                    .await;
                return;
            }
            Err(e) => {
                self.media_failed(asset, e.to_string(), report).await;
                return;
            }
        };

        let content = asset.transcript_document(&transcript);
        match self
            .add_document(&content, &asset.url, &asset.document_title())
            .await
        {
            Ok(true) => {
                info!("Indexed transcript of {}", asset.file_name());
                report.media_transcribed += 1;
                self.emit(IngestEvent::MediaIndexed {
                    url: asset.url.clone(),
                })
                .await;
            }
            Ok(false) => report.media_known += 1,
            Err(e) => {
                warn!("Failed to index transcript of {}: {}", asset.url, e);
                report.ingest_errors += 1;
            }
        }
    }

    async fn media_failed(&self, asset: &MediaAsset, error: String, report: &mut IngestReport) {
        warn!(
            "Transcription of {} via {} failed: {}",
            asset.url,
            self.transcriber.as_ref().map_or("none", |t| t.name()),
            error
        );
        report.media_failed += 1;
        self.emit(IngestEvent::MediaFailed {
            url: asset.url.clone(),
            error,
        })
        .await;
    }

    /// Ingest everything a crawl produced.
    pub async fn run(&self, crawl: &CrawlReport) -> IngestReport {
        let mut report = IngestReport::from_crawl(crawl);
        self.ingest_pages(crawl.page_results(), &mut report).await;
        self.ingest_media(&crawl.media_links(), &mut report).await;
        info!(
            "Ingestion finished: {} pages indexed, {} transcripts, {} errors",
            report.pages_indexed,
            report.media_transcribed,
            report.total_errors()
        );
        report
    }

    /// Search the store and format the hits for display.
    pub async fn search(&self, query: &str, k: usize) -> knowledge::Result<String> {
        let hits = self.store.search(query, k).await?;
        Ok(format_search_results(&hits))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::knowledge::MemoryKnowledgeStore;
    use crate::models::CrawledPage;
    use crate::services::transcription::TranscriptionError;

    struct FakeTranscriber {
        fail_on: Vec<&'static str>,
        empty_on: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTranscriber {
        fn new() -> Self {
            Self {
                fail_on: Vec::new(),
                empty_on: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        fn name(&self) -> &str {
            "fake"
        }

        async fn transcribe(
            &self,
            url: &str,
            _mime_type: &str,
        ) -> Result<String, TranscriptionError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.fail_on.iter().any(|f| url.ends_with(f)) {
                return Err(TranscriptionError::Api("boom".to_string()));
            }
            if self.empty_on.iter().any(|f| url.ends_with(f)) {
                return Ok("   ".to_string());
            }
            Ok(format!("transcript for {}", url))
        }
    }

    fn page(url: &str, title: &str, content: &str) -> PageResult {
        PageResult {
            title: title.to_string(),
            content: content.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn coordinator(store: Arc<MemoryKnowledgeStore>, config: IngestConfig) -> IngestionCoordinator {
        IngestionCoordinator::new(store, config)
    }

    #[tokio::test]
    async fn add_document_is_idempotent() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let coord = coordinator(store.clone(), IngestConfig::default());

        assert!(coord.add_document("body", "src", "Title").await.unwrap());
        assert!(!coord.add_document("other body", "src", "Title").await.unwrap());
        assert_eq!(store.sources(), vec!["src".to_string()]);
        assert_eq!(store.get("src").unwrap().content(), "body");
    }

    #[tokio::test]
    async fn pages_are_indexed_once() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let coord = coordinator(store.clone(), IngestConfig::default());
        let pages = vec![
            page("https://portal.test/a", "A", "alpha"),
            page("https://portal.test/b", "B", ""),
        ];

        let mut report = IngestReport::default();
        coord.ingest_pages(&pages, &mut report).await;
        coord.ingest_pages(&pages, &mut report).await;

        assert_eq!(report.pages_indexed, 1);
        assert_eq!(report.pages_known, 1);
        assert_eq!(report.pages_empty, 2);
        assert_eq!(store.sources(), vec!["https://portal.test/a".to_string()]);
    }

    #[tokio::test]
    async fn learn_everything_indexes_non_matching_pages() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let config = IngestConfig {
            topic: Some("church planting".to_string()),
            ..Default::default()
        };
        let coord = coordinator(store.clone(), config);
        let pages = vec![
            page("https://portal.test/a", "Budget", "spreadsheet"),
            page("https://portal.test/b", "Church planting 101", "steps"),
        ];

        let mut report = IngestReport::default();
        coord.ingest_pages(&pages, &mut report).await;

        assert_eq!(report.priority_pages, 1);
        assert_eq!(report.pages_indexed, 2);
        assert_eq!(report.pages_filtered, 0);
    }

    #[tokio::test]
    async fn focused_mode_filters_non_matching_pages() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let config = IngestConfig {
            topic: Some("church planting".to_string()),
            learn_everything: false,
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::channel(16);
        let coord = coordinator(store.clone(), config).with_events(tx);
        let pages = vec![
            page("https://portal.test/a", "Budget", "spreadsheet"),
            page("https://portal.test/b", "Guide", "Church planting steps"),
        ];

        let mut report = IngestReport::default();
        coord.ingest_pages(&pages, &mut report).await;

        assert_eq!(report.pages_indexed, 1);
        assert_eq!(report.pages_filtered, 1);
        assert_eq!(store.sources(), vec!["https://portal.test/b".to_string()]);

        match rx.recv().await.unwrap() {
            IngestEvent::PageIndexed { source, priority } => {
                assert_eq!(source, "https://portal.test/b");
                assert!(priority);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            IngestEvent::PageFiltered { .. }
        ));
    }

    #[tokio::test]
    async fn transcription_failures_do_not_stop_the_batch() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let mut fake = FakeTranscriber::new();
        fake.fail_on.push("b.mp3");
        fake.empty_on.push("c.mov");
        let transcriber = Arc::new(fake);
        let coord = coordinator(store.clone(), IngestConfig::default())
            .with_transcriber(transcriber.clone());

        let links: BTreeSet<String> = [
            "https://cdn.test/a.mp4",
            "https://cdn.test/b.mp3",
            "https://cdn.test/c.mov",
            "https://cdn.test/d.wav",
            "https://cdn.test/e.pdf",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut report = IngestReport::default();
        coord.ingest_media(&links, &mut report).await;

        assert_eq!(transcriber.calls().len(), 4);
        assert_eq!(report.media_transcribed, 2);
        assert_eq!(report.media_failed, 2);
        assert_eq!(report.media_found[&MediaKind::Video], 2);
        assert_eq!(report.media_found[&MediaKind::Audio], 2);
        assert_eq!(report.media_found[&MediaKind::Pdf], 1);

        assert!(store.get("https://cdn.test/b.mp3").is_none());
        assert!(store.get("https://cdn.test/c.mov").is_none());
        let doc = store.get("https://cdn.test/a.mp4").unwrap();
        assert_eq!(doc.title, "Media: a.mp4");
        assert!(doc
            .content()
            .starts_with("TRANSCRIPT OF https://cdn.test/a.mp4:"));
    }

    #[tokio::test]
    async fn known_media_is_not_transcribed_again() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let transcriber = Arc::new(FakeTranscriber::new());
        let coord = coordinator(store.clone(), IngestConfig::default())
            .with_transcriber(transcriber.clone());
        let links: BTreeSet<String> = ["https://cdn.test/a.mp4".to_string()].into();

        let mut report = IngestReport::default();
        coord.ingest_media(&links, &mut report).await;
        coord.ingest_media(&links, &mut report).await;

        assert_eq!(transcriber.calls().len(), 1);
        assert_eq!(report.media_transcribed, 1);
        assert_eq!(report.media_known, 1);
    }

    #[tokio::test]
    async fn media_is_counted_without_transcriber() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let coord = coordinator(store.clone(), IngestConfig::default());
        let links: BTreeSet<String> = ["https://cdn.test/a.mp4".to_string()].into();

        let mut report = IngestReport::default();
        coord.ingest_media(&links, &mut report).await;

        assert_eq!(report.total_media(), 1);
        assert_eq!(report.media_transcribed, 0);
        assert!(store.sources().is_empty());
    }

    #[tokio::test]
    async fn run_reports_crawl_counts() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let coord = coordinator(store.clone(), IngestConfig::default());

        let mut first = page("https://portal.test/", "Home", "Welcome to the portal");
        first.media_links.insert("https://cdn.test/guide.pdf".to_string());
        let crawl = CrawlReport {
            pages: vec![CrawledPage {
                depth: 0,
                page: first,
            }],
            visited: vec![
                "https://portal.test/".to_string(),
                "https://portal.test/broken".to_string(),
            ],
            ..Default::default()
        };

        let report = coord.run(&crawl).await;
        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.pages_indexed, 1);
        assert_eq!(report.total_media(), 1);

        let summary = report.to_string();
        assert!(summary.contains("Pages indexed:     1"));
        assert!(summary.contains("Media found:       1 (1 pdf)"));
    }

    #[tokio::test]
    async fn search_formats_hits() {
        let store = Arc::new(MemoryKnowledgeStore::new());
        let coord = coordinator(store.clone(), IngestConfig::default());
        coord
            .add_document("Vision casting for teams", "https://portal.test/v", "Vision")
            .await
            .unwrap();

        let text = coord.search("vision", 3).await.unwrap();
        assert_eq!(
            text,
            "[Source: https://portal.test/v]\nVision casting for teams"
        );
    }
}
