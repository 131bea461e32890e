//! Knowledge store: the document index that ingestion writes into.
//!
//! The coordinator only depends on the [`KnowledgeStore`] contract. The
//! store, not the crawler, is authoritative for whether a source is known.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKnowledgeStore;
pub use sqlite::SqliteKnowledgeStore;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::IndexedDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A chunk matching a search query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub source: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: u32,
}

/// Store-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: u64,
    pub chunks: u64,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Whether a document with this source has been indexed.
    async fn exists(&self, source: &str) -> Result<bool>;

    /// Persist a document. Returns `false` when the source was already present.
    async fn add(&self, document: IndexedDocument) -> Result<bool>;

    /// Best `k` chunks for `query`, highest score first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Lower-cased alphanumeric search terms, deduplicated in order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Keyword relevance of a chunk.
///
/// Chunks matching more distinct terms always outrank chunks that repeat a
/// single term; occurrences break ties. Zero means no term matched.
pub fn score_chunk(text: &str, terms: &[String]) -> u32 {
    let lower = text.to_lowercase();
    let mut distinct = 0u32;
    let mut occurrences = 0u32;
    for term in terms {
        let count = lower.matches(term.as_str()).count() as u32;
        if count > 0 {
            distinct += 1;
            occurrences += count;
        }
    }
    if distinct == 0 {
        0
    } else {
        distinct * 1000 + occurrences.min(999)
    }
}

/// Rank scored hits and keep the best `k`.
pub(crate) fn top_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(k);
    hits
}

/// Render hits the way retrieval prompts consume them.
pub fn format_search_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("[Source: {}]\n{}", hit.source, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_normalized_and_unique() {
        assert_eq!(
            query_terms("Church-planting, church GROWTH!"),
            vec!["church", "planting", "growth"]
        );
        assert!(query_terms("  ?! ").is_empty());
    }

    #[test]
    fn distinct_terms_outrank_repetition() {
        let terms = query_terms("vision team");
        let both = score_chunk("Vision for the team", &terms);
        let repeated = score_chunk("vision vision vision vision", &terms);
        assert!(both > repeated);
        assert_eq!(score_chunk("nothing relevant", &terms), 0);
    }

    #[test]
    fn top_hits_orders_by_score_then_position() {
        let hit = |source: &str, idx: usize, score: u32| SearchHit {
            source: source.to_string(),
            title: String::new(),
            chunk_index: idx,
            text: String::new(),
            score,
        };
        let ranked = top_hits(vec![hit("b", 0, 5), hit("a", 1, 9), hit("a", 0, 5)], 2);
        assert_eq!(ranked[0].score, 9);
        assert_eq!((ranked[1].source.as_str(), ranked[1].chunk_index), ("a", 0));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn results_are_labelled_with_source() {
        let hits = vec![
            SearchHit {
                source: "https://portal.test/a".to_string(),
                title: "A".to_string(),
                chunk_index: 0,
                text: "first".to_string(),
                score: 1,
            },
            SearchHit {
                source: "https://portal.test/b".to_string(),
                title: "B".to_string(),
                chunk_index: 2,
                text: "second".to_string(),
                score: 1,
            },
        ];
        assert_eq!(
            format_search_results(&hits),
            "[Source: https://portal.test/a]\nfirst\n\n[Source: https://portal.test/b]\nsecond"
        );
    }
}
