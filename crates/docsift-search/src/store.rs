//! SQLite + FTS5 storage for chunks, embeddings and full documents.
//!
//! Chunks live in one table with their metadata as JSON and their embedding
//! as a little-endian `f32` BLOB. An external-content FTS5 table over heading,
//! title and content provides the sparse channel; cosine similarity for the
//! dense channel is computed in Rust.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use docsift_core::{Chunk, Document, DocumentMeta, DocsiftError, Framework, Result};
use rusqlite::{named_params, params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::channel::{
    BoxFuture, ChunkStore, IndexRecord, IndexWriter, RetrievalChannel, SearchHit, SearchSource,
};
use crate::filter::SearchFilter;

const CHUNK_COLUMNS: &str =
    "c.chunk_id, c.parent_id, c.framework, c.file_path, c.source_url, c.content, c.metadata";

const FILTER_CLAUSE: &str =
    "(:framework IS NULL OR c.framework = :framework OR c.framework = 'common')
     AND (:version IS NULL OR c.version = :version)";

/// Index statistics.
///
/// # Examples
///
/// ```
/// use docsift_search::IndexStats;
///
/// let stats = IndexStats {
///     total_chunks: 120,
///     total_documents: 12,
///     embedded_chunks: 120,
///     index_size_bytes: 65536,
///     last_indexed_at: None,
/// };
/// assert_eq!(stats.total_documents, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Number of stored full documents.
    pub total_documents: usize,
    /// Chunks that carry an embedding.
    pub embedded_chunks: usize,
    /// Size of the database in bytes.
    pub index_size_bytes: u64,
    /// RFC 3339 timestamp of the most recent document write.
    pub last_indexed_at: Option<String>,
}

/// SQLite-backed chunk index: sparse channel, vector store and chunk store.
///
/// # Examples
///
/// ```
/// use docsift_search::ChunkIndex;
///
/// let index = ChunkIndex::in_memory().unwrap();
/// assert_eq!(index.stats().unwrap().total_chunks, 0);
/// ```
pub struct ChunkIndex {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndex").finish_non_exhaustive()
    }
}

struct ChunkRow {
    chunk_id: String,
    parent_id: Option<String>,
    framework: String,
    file_path: String,
    source_url: String,
    content: String,
    metadata: String,
}

impl ChunkRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chunk_id: row.get(0)?,
            parent_id: row.get(1)?,
            framework: row.get(2)?,
            file_path: row.get(3)?,
            source_url: row.get(4)?,
            content: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    fn into_chunk(self) -> Result<Chunk> {
        let framework: Framework = self.framework.parse()?;
        Ok(Chunk {
            chunk_id: self.chunk_id,
            parent_id: self.parent_id,
            framework,
            content: self.content,
            source_url: self.source_url,
            file_path: self.file_path,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

impl ChunkIndex {
    /// Open or create an index database at `path`.
    ///
    /// Creates the parent directory and the schema if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use docsift_search::ChunkIndex;
    ///
    /// let index = ChunkIndex::open(Path::new(".docsift/index.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DocsiftError::Database(format!("failed to create index directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| DocsiftError::Database(format!("failed to open database: {e}")))?;

        let index = Self {
            conn: Mutex::new(conn),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Create an in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DocsiftError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let index = Self {
            conn: Mutex::new(conn),
        };
        index.init_schema()?;
        Ok(index)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DocsiftError::Database("index connection lock poisoned".into()))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS documents (
                    file_path TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    indexed_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    chunk_id TEXT NOT NULL UNIQUE,
                    parent_id TEXT,
                    framework TEXT NOT NULL,
                    version TEXT,
                    file_path TEXT NOT NULL,
                    source_url TEXT NOT NULL,
                    heading TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    embedding BLOB,
                    ordinal INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS chunks_file_path ON chunks(file_path);
                CREATE INDEX IF NOT EXISTS chunks_parent_id ON chunks(parent_id);

                CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                    heading, title, content,
                    content='chunks', content_rowid='id'
                );

                CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                    INSERT INTO chunks_fts(rowid, heading, title, content)
                    VALUES (new.id, new.heading, new.title, new.content);
                END;

                CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                    INSERT INTO chunks_fts(chunks_fts, rowid, heading, title, content)
                    VALUES ('delete', old.id, old.heading, old.title, old.content);
                END;

                CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
                    INSERT INTO chunks_fts(chunks_fts, rowid, heading, title, content)
                    VALUES ('delete', old.id, old.heading, old.title, old.content);
                    INSERT INTO chunks_fts(rowid, heading, title, content)
                    VALUES (new.id, new.heading, new.title, new.content);
                END;
                ",
            )
            .map_err(|e| DocsiftError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Record the embedding dimensions the index is built with.
    ///
    /// A no-op when the stored value matches.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] when the index was built with
    /// different dimensions.
    pub fn set_dimensions(&self, dimensions: usize) -> Result<()> {
        if let Some(stored) = self.get_dimensions()? {
            if stored != dimensions {
                return Err(DocsiftError::Database(format!(
                    "index was built with {stored}-dimensional embeddings but config specifies {dimensions}; \
                     rebuild it with `docsift index --rebuild`"
                )));
            }
            return Ok(());
        }
        self.set_metadata("embedding_dimensions", &dimensions.to_string())
    }

    /// Embedding dimensions recorded for this index, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure or corrupt metadata.
    pub fn get_dimensions(&self) -> Result<Option<usize>> {
        self.get_metadata("embedding_dimensions")?
            .map(|value| {
                value.parse().map_err(|_| {
                    DocsiftError::Database(format!("corrupted dimension metadata in index: '{value}'"))
                })
            })
            .transpose()
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DocsiftError::Database(format!("failed to get metadata '{key}': {e}")))
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| DocsiftError::Database(format!("failed to set metadata '{key}': {e}")))?;
        Ok(())
    }

    /// Insert or replace chunk records in one transaction.
    ///
    /// Records are keyed by `chunk_id`; an existing row is updated in place
    /// so the keyword index stays in sync.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on write failure; nothing from the
    /// batch is kept in that case.
    pub fn upsert_records(&self, records: &[IndexRecord]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DocsiftError::Database(format!("failed to begin transaction: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks
                     (chunk_id, parent_id, framework, version, file_path, source_url,
                      heading, title, content, metadata, embedding, ordinal)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                     ON CONFLICT(chunk_id) DO UPDATE SET
                        parent_id = excluded.parent_id,
                        framework = excluded.framework,
                        version = excluded.version,
                        file_path = excluded.file_path,
                        source_url = excluded.source_url,
                        heading = excluded.heading,
                        title = excluded.title,
                        content = excluded.content,
                        metadata = excluded.metadata,
                        embedding = excluded.embedding,
                        ordinal = excluded.ordinal",
                )
                .map_err(|e| DocsiftError::Database(format!("failed to prepare upsert: {e}")))?;

            for record in records {
                let chunk = &record.chunk;
                let metadata = serde_json::to_string(&chunk.metadata)?;
                let embedding =
                    (!record.embedding.is_empty()).then(|| floats_to_bytes(&record.embedding));
                stmt.execute(params![
                    chunk.chunk_id,
                    chunk.parent_id,
                    chunk.framework.as_str(),
                    chunk.metadata.version,
                    chunk.file_path,
                    chunk.source_url,
                    chunk.metadata.heading,
                    chunk.metadata.title,
                    chunk.content,
                    metadata,
                    embedding,
                    record.ordinal as i64,
                ])
                .map_err(|e| {
                    DocsiftError::Database(format!("failed to upsert chunk {}: {e}", chunk.chunk_id))
                })?;
            }
        }
        tx.commit()
            .map_err(|e| DocsiftError::Database(format!("failed to commit chunks: {e}")))?;

        Ok(records.len())
    }

    /// Delete every chunk and document at `source` or under it as a directory.
    ///
    /// `guides/grid` removes `guides/grid` and `guides/grid/columns.md` but not
    /// `guides/grid.md` or `guides/gridlines.md`. A blank source removes
    /// nothing. Returns the number of chunks deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on delete failure.
    pub fn remove_source(&self, source: &str) -> Result<usize> {
        let source = source.trim().trim_start_matches("./").trim_end_matches('/');
        if source.is_empty() {
            return Ok(0);
        }
        let prefix = format!("{source}/");
        let prefix_len = prefix.chars().count() as i64;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DocsiftError::Database(format!("failed to begin transaction: {e}")))?;
        let deleted = tx
            .execute(
                "DELETE FROM chunks WHERE file_path = ?1 OR substr(file_path, 1, ?3) = ?2",
                params![source, prefix, prefix_len],
            )
            .map_err(|e| DocsiftError::Database(format!("failed to delete chunks: {e}")))?;
        tx.execute(
            "DELETE FROM documents WHERE file_path = ?1 OR substr(file_path, 1, ?3) = ?2",
            params![source, prefix, prefix_len],
        )
        .map_err(|e| DocsiftError::Database(format!("failed to delete documents: {e}")))?;
        tx.commit()
            .map_err(|e| DocsiftError::Database(format!("failed to commit delete: {e}")))?;

        tracing::debug!(source, deleted, "removed source from index");
        Ok(deleted)
    }

    /// Every file path with chunks or a document row, sorted and distinct.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    pub fn sources(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT file_path FROM chunks
                 UNION
                 SELECT file_path FROM documents
                 ORDER BY 1",
            )
            .map_err(|e| DocsiftError::Database(format!("failed to prepare source query: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DocsiftError::Database(format!("source query failed: {e}")))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DocsiftError::Database(format!("failed to read source row: {e}")))
    }

    /// Insert or replace full-document records, stamping them with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on write failure.
    pub fn store_documents(&self, documents: &[Document]) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| DocsiftError::Database(format!("failed to begin transaction: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO documents (file_path, content, metadata, indexed_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(file_path) DO UPDATE SET
                        content = excluded.content,
                        metadata = excluded.metadata,
                        indexed_at = excluded.indexed_at",
                )
                .map_err(|e| DocsiftError::Database(format!("failed to prepare insert: {e}")))?;
            for doc in documents {
                let metadata = serde_json::to_string(&doc.meta)?;
                stmt.execute(params![doc.meta.file_path, doc.content, metadata, now])
                    .map_err(|e| {
                        DocsiftError::Database(format!(
                            "failed to store document {}: {e}",
                            doc.meta.file_path
                        ))
                    })?;
            }
        }
        tx.commit()
            .map_err(|e| DocsiftError::Database(format!("failed to commit documents: {e}")))?;
        Ok(documents.len())
    }

    /// Look up one chunk by id.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_search::ChunkIndex;
    ///
    /// let index = ChunkIndex::in_memory().unwrap();
    /// assert!(index.chunk("missing").unwrap().is_none());
    /// ```
    pub fn chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks c WHERE c.chunk_id = ?1"),
                params![chunk_id],
                ChunkRow::read,
            )
            .optional()
            .map_err(|e| DocsiftError::Database(format!("failed to get chunk: {e}")))?;
        row.map(ChunkRow::into_chunk).transpose()
    }

    /// Chunks whose parent is `chunk_id`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    pub fn children(&self, chunk_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM chunks c
                 WHERE c.parent_id = ?1
                 ORDER BY c.file_path, c.ordinal"
            ))
            .map_err(|e| DocsiftError::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![chunk_id], ChunkRow::read)
            .map_err(|e| DocsiftError::Database(format!("failed to query children: {e}")))?;

        let mut children = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DocsiftError::Database(format!("failed to read row: {e}")))?;
            children.push(row.into_chunk()?);
        }
        Ok(children)
    }

    /// Look up a full document by file path.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    pub fn document(&self, file_path: &str) -> Result<Option<Document>> {
        let row: Option<(String, String)> = self
            .conn()?
            .query_row(
                "SELECT content, metadata FROM documents WHERE file_path = ?1",
                params![file_path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| DocsiftError::Database(format!("failed to get document: {e}")))?;

        match row {
            Some((content, metadata)) => {
                let meta: DocumentMeta = serde_json::from_str(&metadata)?;
                Ok(Some(Document { content, meta }))
            }
            None => Ok(None),
        }
    }

    /// Vector similarity search over embedded chunks that pass `filter`.
    ///
    /// Loads candidate embeddings and ranks them by cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    pub fn vector_search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHUNK_COLUMNS}, c.embedding FROM chunks c
                 WHERE c.embedding IS NOT NULL AND {FILTER_CLAUSE}"
            ))
            .map_err(|e| DocsiftError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":framework": filter.framework.map(Framework::as_str),
                    ":version": filter.version.as_deref(),
                },
                |row| {
                    let embedding: Vec<u8> = row.get(7)?;
                    Ok((ChunkRow::read(row)?, embedding))
                },
            )
            .map_err(|e| DocsiftError::Database(format!("failed to query chunks: {e}")))?;

        let mut scored: Vec<(f64, ChunkRow)> = Vec::new();
        for row in rows {
            let (chunk, bytes) =
                row.map_err(|e| DocsiftError::Database(format!("failed to read row: {e}")))?;
            let score = cosine_similarity(query_embedding, &bytes_to_floats(&bytes));
            scored.push((score, chunk));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, row)| {
                Ok(SearchHit {
                    chunk: row.into_chunk()?,
                    score,
                    source: SearchSource::Dense,
                })
            })
            .collect()
    }

    /// Full-text keyword search via FTS5 (BM25) over chunks that pass `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_search::{ChunkIndex, SearchFilter};
    ///
    /// let index = ChunkIndex::in_memory().unwrap();
    /// let hits = index.keyword_search("grid", 5, &SearchFilter::default()).unwrap();
    /// assert!(hits.is_empty());
    /// ```
    pub fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let fts_query = sanitize_fts_query(query);
        if fts_query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHUNK_COLUMNS}, chunks_fts.rank
                 FROM chunks_fts
                 JOIN chunks c ON c.id = chunks_fts.rowid
                 WHERE chunks_fts MATCH :query AND {FILTER_CLAUSE}
                 ORDER BY chunks_fts.rank
                 LIMIT :limit"
            ))
            .map_err(|e| DocsiftError::Database(format!("failed to prepare FTS query: {e}")))?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":query": fts_query,
                    ":framework": filter.framework.map(Framework::as_str),
                    ":version": filter.version.as_deref(),
                    ":limit": limit as i64,
                },
                |row| {
                    let rank: f64 = row.get(7)?;
                    Ok((ChunkRow::read(row)?, rank))
                },
            )
            .map_err(|e| DocsiftError::Database(format!("FTS query failed: {e}")))?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk, rank) =
                row.map_err(|e| DocsiftError::Database(format!("failed to read FTS row: {e}")))?;
            // bm25 rank is negative, more negative is more relevant
            hits.push(SearchHit {
                chunk: chunk.into_chunk()?,
                score: (-rank).max(0.0),
                source: SearchSource::Sparse,
            });
        }
        Ok(hits)
    }

    /// Index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<usize> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| DocsiftError::Database(format!("failed to count rows: {e}")))
        };
        let total_chunks = count("SELECT COUNT(*) FROM chunks")?;
        let total_documents = count("SELECT COUNT(*) FROM documents")?;
        let embedded_chunks = count("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")?;

        let last_indexed_at: Option<String> = conn
            .query_row("SELECT MAX(indexed_at) FROM documents", [], |row| row.get(0))
            .map_err(|e| DocsiftError::Database(format!("failed to read timestamps: {e}")))?;

        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexStats {
            total_chunks,
            total_documents,
            embedded_chunks,
            index_size_bytes: (page_count * page_size).max(0) as u64,
            last_indexed_at,
        })
    }
}

impl RetrievalChannel for ChunkIndex {
    fn search<'a>(
        &'a self,
        query: &'a str,
        k: usize,
        filter: &'a SearchFilter,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move { self.keyword_search(query, k, filter) })
    }
}

impl ChunkStore for ChunkIndex {
    fn get_chunk<'a>(&'a self, chunk_id: &'a str) -> BoxFuture<'a, Result<Option<Chunk>>> {
        Box::pin(async move { self.chunk(chunk_id) })
    }

    fn get_document<'a>(&'a self, file_path: &'a str) -> BoxFuture<'a, Result<Option<Document>>> {
        Box::pin(async move { self.document(file_path) })
    }
}

impl IndexWriter for ChunkIndex {
    fn upsert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move { self.upsert_records(&records) })
    }

    fn delete_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move { self.remove_source(source) })
    }

    fn upsert_documents(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move { self.store_documents(&documents) })
    }
    fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { self.sources() })
    }
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    floats.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Turn free text into an FTS5 query: each distinct word, quoted, OR-ed.
fn sanitize_fts_query(query: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for word in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if word.is_empty() {
            continue;
        }
        let quoted = format!("\"{}\"", word.to_lowercase());
        if !words.contains(&quoted) {
            words.push(quoted);
        }
    }
    words.join(" OR ")
}
