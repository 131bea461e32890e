//! In-process knowledge store, for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{query_terms, score_chunk, top_hits, KnowledgeStore, Result, SearchHit, StoreStats};
use crate::models::IndexedDocument;

#[derive(Debug, Default)]
pub struct MemoryKnowledgeStore {
    documents: Mutex<BTreeMap<String, IndexedDocument>>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str) -> Option<IndexedDocument> {
        self.lock().get(source).cloned()
    }

    pub fn sources(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, IndexedDocument>> {
        // A poisoned map is still consistent: every insert is a single call.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn exists(&self, source: &str) -> Result<bool> {
        Ok(self.lock().contains_key(source))
    }

    async fn add(&self, document: IndexedDocument) -> Result<bool> {
        let mut documents = self.lock();
        if documents.contains_key(&document.source) {
            return Ok(false);
        }
        documents.insert(document.source.clone(), document);
        Ok(true)
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .lock()
            .values()
            .flat_map(|doc| {
                doc.chunks.iter().filter_map(|chunk| {
                    let score = score_chunk(&chunk.text, &terms);
                    (score > 0).then(|| SearchHit {
                        source: doc.source.clone(),
                        title: doc.title.clone(),
                        chunk_index: chunk.index,
                        text: chunk.text.clone(),
                        score,
                    })
                })
            })
            .collect();

        Ok(top_hits(hits, k))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let documents = self.lock();
        Ok(StoreStats {
            documents: documents.len() as u64,
            chunks: documents.values().map(|d| d.chunks.len() as u64).sum(),
        })
    }
}
