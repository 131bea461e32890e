//! Knowledge documents and their ordered chunks.
//!
//! A document is keyed by its `source` (page URL or media URL). Content is
//! split into fixed-size windows whose index records the original position,
//! so concatenating chunks in index order reproduces the content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default chunk window in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// One window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Position of this chunk within the document.
    pub index: usize,
    pub text: String,
}

impl DocumentChunk {
    /// Stable chunk identifier: `{source}_{index}`.
    pub fn id(&self, source: &str) -> String {
        format!("{}_{}", source, self.index)
    }
}

/// A document ready to be persisted in the knowledge store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Unique key; no source is indexed twice.
    pub source: String,
    pub title: String,
    pub chunks: Vec<DocumentChunk>,
    /// SHA-256 of the full content.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl IndexedDocument {
    /// Build a document by chunking `content` into `chunk_size` character windows.
    pub fn new(source: &str, title: &str, content: &str, chunk_size: usize) -> Self {
        let chunks = chunk_text(content, chunk_size)
            .into_iter()
            .enumerate()
            .map(|(index, text)| DocumentChunk { index, text })
            .collect();

        Self {
            source: source.to_string(),
            title: title.to_string(),
            chunks,
            content_hash: Self::compute_hash(content.as_bytes()),
            created_at: Utc::now(),
        }
    }

    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Reassemble the original content from the chunks.
    pub fn content(&self) -> String {
        let mut chunks: Vec<&DocumentChunk> = self.chunks.iter().collect();
        chunks.sort_by_key(|c| c.index);
        chunks.into_iter().map(|c| c.text.as_str()).collect()
    }
}

/// Split text into consecutive windows of at most `chunk_size` characters.
///
/// Splits on char boundaries, never inside a UTF-8 sequence. A zero size is
/// treated as one.
pub fn chunk_text(content: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in content.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_preserves_order_and_content() {
        let content = "abcdefghij".repeat(25);
        let doc = IndexedDocument::new("https://portal.test/a", "A", &content, 100);

        assert_eq!(doc.chunks.len(), 3);
        assert_eq!(doc.chunks[0].index, 0);
        assert_eq!(doc.chunks[2].text.len(), 50);
        assert_eq!(doc.content(), content);
    }

    #[test]
    fn chunking_respects_char_boundaries() {
        let chunks = chunk_text("ñandú ñandú", 3);
        assert_eq!(chunks, vec!["ñan", "dú ", "ñan", "dú"]);
    }

    #[test]
    fn empty_content_has_no_chunks() {
        assert!(chunk_text("", DEFAULT_CHUNK_SIZE).is_empty());
    }

    #[test]
    fn chunk_id_uses_source_and_index() {
        let doc = IndexedDocument::new("src", "t", "hello", 2);
        assert_eq!(doc.chunks[1].id(&doc.source), "src_1");
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(
            IndexedDocument::compute_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
