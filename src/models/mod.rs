//! Data models for the crawl and ingestion pipeline.

mod crawl;
mod document;
mod media;

pub use crawl::{
    CrawlEvent, CrawlFailure, CrawlReport, CrawlTarget, CrawledPage, PageResult, SkipReason,
    SkippedTarget,
};
pub use document::{chunk_text, DocumentChunk, IndexedDocument, DEFAULT_CHUNK_SIZE};
pub use media::MediaAsset;
