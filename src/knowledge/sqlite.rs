//! SQLite-backed knowledge store.
//!
//! Documents and their chunks live in two tables. Every call opens its own
//! connection on a blocking thread, so the store is cheap to share.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{
    query_terms, score_chunk, top_hits, KnowledgeStore, Result, SearchHit, StoreError, StoreStats,
};
use crate::models::{DocumentChunk, IndexedDocument};

#[derive(Debug, Clone)]
pub struct SqliteKnowledgeStore {
    db_path: PathBuf,
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl SqliteKnowledgeStore {
    /// Open (or create) the store at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                source TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL REFERENCES documents(source) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                UNIQUE(source, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
        "#,
        )?;
        Ok(())
    }

    /// Check if a source has been indexed.
    pub fn exists_blocking(&self, source: &str) -> Result<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM documents WHERE source = ?",
                params![source],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a document and its chunks in one transaction.
    pub fn add_blocking(&self, document: &IndexedDocument) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO documents (source, title, content_hash, chunk_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                document.source,
                document.title,
                document.content_hash,
                document.chunks.len() as i64,
                document.created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            debug!("{} already indexed", document.source);
            return Ok(false);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, source, chunk_index, text) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chunk in &document.chunks {
                stmt.execute(params![
                    chunk.id(&document.source),
                    document.source,
                    chunk.index as i64,
                    chunk.text,
                ])?;
            }
        }

        tx.commit()?;
        Ok(true)
    }

    /// Load a document with its chunks in index order.
    pub fn get_blocking(&self, source: &str) -> Result<Option<IndexedDocument>> {
        let conn = self.connect()?;

        let header = conn
            .query_row(
                "SELECT title, content_hash, created_at FROM documents WHERE source = ?",
                params![source],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, content_hash, created_at)) = header else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT chunk_index, text FROM chunks WHERE source = ? ORDER BY chunk_index")?;
        let chunks = stmt
            .query_map(params![source], |row| {
                Ok(DocumentChunk {
                    index: row.get::<_, i64>(0)? as usize,
                    text: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(IndexedDocument {
            source: source.to_string(),
            title,
            chunks,
            content_hash,
            created_at: parse_datetime(&created_at),
        }))
    }

    /// Keyword search over chunk text.
    ///
    /// SQLite's `lower()` only folds ASCII, so every chunk is scored here
    /// with Unicode case folding.
    pub fn search_blocking(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT c.source, d.title, c.chunk_index, c.text \
             FROM chunks c JOIN documents d ON d.source = c.source",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (source, title, index, text) = row?;
            let score = score_chunk(&text, &terms);
            if score > 0 {
                hits.push(SearchHit {
                    source,
                    title,
                    chunk_index: index as usize,
                    text,
                    score,
                });
            }
        }

        Ok(top_hits(hits, k))
    }

    pub fn stats_blocking(&self) -> Result<StoreStats> {
        let conn = self.connect()?;
        let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(StoreStats {
            documents: documents as u64,
            chunks: chunks as u64,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteKnowledgeStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(StoreError::from)?
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn exists(&self, source: &str) -> Result<bool> {
        let source = source.to_string();
        self.blocking(move |store| store.exists_blocking(&source))
            .await
    }

    async fn add(&self, document: IndexedDocument) -> Result<bool> {
        self.blocking(move |store| store.add_blocking(&document))
            .await
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query = query.to_string();
        self.blocking(move |store| store.search_blocking(&query, k))
            .await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.blocking(|store| store.stats_blocking()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SqliteKnowledgeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteKnowledgeStore::new(&dir.path().join("kb").join("brain.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn second_add_for_same_source_is_rejected() {
        let (_dir, store) = store();
        let doc = IndexedDocument::new("https://portal.test/a", "A", &"x".repeat(2500), 1000);

        assert!(store.add(doc.clone()).await.unwrap());
        assert!(!store.add(doc).await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 3);
    }

    #[tokio::test]
    async fn exists_reflects_added_sources() {
        let (_dir, store) = store();
        assert!(!store.exists("src").await.unwrap());
        store
            .add(IndexedDocument::new("src", "T", "content", 1000))
            .await
            .unwrap();
        assert!(store.exists("src").await.unwrap());
    }

    #[test]
    fn stored_chunks_reassemble_content() {
        let (_dir, store) = store();
        let content = "Multiplying churches through leadership pipelines. ".repeat(60);
        let doc = IndexedDocument::new("src", "Pipelines", &content, 1000);
        store.add_blocking(&doc).unwrap();

        let loaded = store.get_blocking("src").unwrap().unwrap();
        assert_eq!(loaded.title, "Pipelines");
        assert_eq!(loaded.content(), content);
        assert_eq!(loaded.content_hash, doc.content_hash);
        assert!(store.get_blocking("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn search_ranks_by_term_coverage() {
        let (_dir, store) = store();
        store
            .add(IndexedDocument::new("a", "A", "Coaching new planters", 1000))
            .await
            .unwrap();
        store
            .add(IndexedDocument::new("b", "B", "Coaching coaching coaching", 1000))
            .await
            .unwrap();
        store
            .add(IndexedDocument::new("c", "C", "Facilities checklist", 1000))
            .await
            .unwrap();

        let hits = store.search("coaching planters", 10).await.unwrap();
        let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert_eq!(hits[0].title, "A");

        assert_eq!(store.search("coaching", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let (_dir, store) = store();
        store
            .add(IndexedDocument::new(
                "kit",
                "Kit",
                "ASSET: Launch Kit\nSECCIÓN: Recursos",
                1000,
            ))
            .await
            .unwrap();

        let hits = store.search("sección", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "kit");
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain.db");
        SqliteKnowledgeStore::new(&path)
            .unwrap()
            .add_blocking(&IndexedDocument::new("src", "T", "content", 1000))
            .unwrap();

        let reopened = SqliteKnowledgeStore::new(&path).unwrap();
        assert!(reopened.exists_blocking("src").unwrap());
    }
}
