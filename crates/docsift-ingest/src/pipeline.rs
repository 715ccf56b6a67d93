//! Ingestion pass: chunk → hierarchy → relationships → validate → write.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use docsift_chunker::Chunker;
use docsift_core::{
    normalize_path, Chunk, ChunkerConfig, DocsiftError, Document, IngestConfig, Result,
};
use docsift_graph::{build_hierarchy, build_relationships, validate_graph};
use docsift_search::{Embedder, IndexRecord, IndexWriter};
use serde::Serialize;

use crate::retry::RetryPolicy;

/// A batch that could not be embedded or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Zero-based batch number.
    pub batch: usize,
    /// Chunks the batch carried.
    pub chunk_ids: Vec<String>,
    /// Final error after retries.
    pub error: String,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents received.
    pub documents: usize,
    /// Chunks in the validated graph.
    pub chunks: usize,
    /// Batches embedded and written.
    pub batches_written: usize,
    /// Batches that failed after retries.
    pub failed_batches: Vec<BatchFailure>,
    /// Files whose old rows could not be replaced or removed, with the error.
    pub failed_files: Vec<(String, String)>,
    /// Previously indexed files absent from this pass, now deleted.
    pub removed_files: Vec<String>,
}

impl IngestReport {
    /// Whether every file and batch was written.
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty() && self.failed_files.is_empty()
    }

    /// Chunks that did not reach the index.
    pub fn failed_chunks(&self) -> usize {
        self.failed_batches.iter().map(|b| b.chunk_ids.len()).sum()
    }
}

/// Runs a full ingestion pass against an [`Embedder`] and an [`IndexWriter`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use docsift_core::{ChunkerConfig, IngestConfig};
/// use docsift_ingest::IngestionPipeline;
/// use docsift_search::{ChunkIndex, EmbeddingClient};
///
/// # async fn example() -> docsift_core::Result<()> {
/// let index = Arc::new(ChunkIndex::open(".docsift/index.db".as_ref())?);
/// let embedder = Arc::new(EmbeddingClient::new("key"));
/// let pipeline = IngestionPipeline::new(
///     ChunkerConfig::default(),
///     IngestConfig::default(),
///     embedder,
///     index,
/// );
/// let docs = docsift_ingest::discover_documents("docs".as_ref(), "https://docs.example.com")?;
/// let report = pipeline.ingest(docs).await?;
/// println!("{} chunks in {} batches", report.chunks, report.batches_written);
/// # Ok(())
/// # }
/// ```
pub struct IngestionPipeline {
    chunker: Chunker,
    config: IngestConfig,
    retry: RetryPolicy,
    embedder: Arc<dyn Embedder>,
    writer: Arc<dyn IndexWriter>,
}

impl IngestionPipeline {
    /// Build a pipeline whose retry policy comes from `config`.
    pub fn new(
        chunker_config: ChunkerConfig,
        config: IngestConfig,
        embedder: Arc<dyn Embedder>,
        writer: Arc<dyn IndexWriter>,
    ) -> Self {
        Self {
            chunker: Chunker::new(chunker_config),
            retry: RetryPolicy::from_config(&config),
            config,
            embedder,
            writer,
        }
    }

    /// Replace the retry policy derived from the `[ingest]` section.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Chunk, link, validate and write `documents`.
    ///
    /// The pass replaces the index wholesale: each file's previous rows are
    /// deleted before its new chunks are written, and files indexed earlier
    /// but missing from `documents` are deleted too. Failed batches and
    /// files are recorded in the report and the pass carries on. An empty
    /// `documents` leaves the index untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Graph`] when the linked chunk graph is invalid,
    /// or the writer's error when the indexed paths cannot be listed;
    /// nothing is written in either case.
    pub async fn ingest(&self, mut documents: Vec<Document>) -> Result<IngestReport> {
        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };
        if documents.is_empty() {
            return Ok(report);
        }
        for document in &mut documents {
            document.meta.file_path = normalize_path(&document.meta.file_path);
        }

        let by_file = self.chunker.chunk_all(&documents);
        let ordinals: HashMap<String, usize> = by_file
            .values()
            .flat_map(|chunks| {
                chunks
                    .iter()
                    .enumerate()
                    .map(|(ordinal, chunk)| (chunk.chunk_id.clone(), ordinal))
            })
            .collect();

        let hierarchy = build_hierarchy(by_file.keys());
        let graph = build_relationships(by_file, &hierarchy);
        let validated = validate_graph(&graph).into_result()?;
        report.chunks = graph.len();
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            roots = validated.roots,
            "chunk graph built"
        );

        let paths: BTreeSet<&str> = documents.iter().map(|d| d.meta.file_path.as_str()).collect();
        let indexed = self.retry.run("list sources", || self.writer.list_sources()).await?;
        for stale in indexed.iter().filter(|p| !paths.contains(p.as_str())) {
            match self
                .retry
                .run("delete", || self.writer.delete_by_source(stale))
                .await
            {
                Ok(count) => {
                    tracing::info!(file = %stale, deleted = count, "removed file no longer in the docs");
                    report.removed_files.push(stale.clone());
                }
                Err(e) => {
                    tracing::warn!(file = %stale, error = %e, "could not remove stale file");
                    report.failed_files.push((stale.clone(), e.to_string()));
                }
            }
        }

        let mut skipped: BTreeSet<String> = BTreeSet::new();
        for path in paths {
            let deleted = self
                .retry
                .run("delete", || self.writer.delete_by_source(path))
                .await;
            match deleted {
                Ok(count) => tracing::debug!(file = path, deleted = count, "cleared previous chunks"),
                Err(e) => {
                    tracing::warn!(file = path, error = %e, "could not clear file, skipping it");
                    report.failed_files.push((path.to_string(), e.to_string()));
                    skipped.insert(path.to_string());
                }
            }
        }

        let pending: Vec<Chunk> = graph
            .into_iter()
            .filter(|c| !skipped.contains(&c.file_path))
            .collect();
        let batch_size = self.config.batch_size.max(1);
        let delay = Duration::from_millis(self.config.batch_delay_ms);

        for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
            if batch_no > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.write_batch(batch, &ordinals).await {
                Ok(written) => {
                    report.batches_written += 1;
                    tracing::info!(batch = batch_no, chunks = written, "batch written");
                }
                Err(e) => {
                    tracing::warn!(batch = batch_no, chunks = batch.len(), error = %e, "batch failed");
                    report.failed_batches.push(BatchFailure {
                        batch: batch_no,
                        chunk_ids: batch.iter().map(|c| c.chunk_id.clone()).collect(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let stored: Vec<Document> = documents
            .into_iter()
            .filter(|d| !skipped.contains(&d.meta.file_path))
            .collect();
        let stored_paths: Vec<String> = stored.iter().map(|d| d.meta.file_path.clone()).collect();
        if let Err(e) = self
            .retry
            .run("store documents", || self.writer.upsert_documents(stored.clone()))
            .await
        {
            tracing::warn!(error = %e, "could not store full documents");
            report
                .failed_files
                .extend(stored_paths.into_iter().map(|p| (p, e.to_string())));
        }

        tracing::info!(
            batches = report.batches_written,
            failed_batches = report.failed_batches.len(),
            failed_files = report.failed_files.len(),
            removed_files = report.removed_files.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn write_batch(&self, batch: &[Chunk], ordinals: &HashMap<String, usize>) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.retry.run("embed", || self.embedder.embed(&texts)).await?;
        if vectors.len() != batch.len() {
            return Err(DocsiftError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let records: Vec<IndexRecord> = batch
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexRecord {
                ordinal: ordinals.get(&chunk.chunk_id).copied().unwrap_or_default(),
                chunk,
                embedding,
            })
            .collect();
        self.retry
            .run("upsert", || self.writer.upsert(records.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::{DocumentMeta, Framework};
    use docsift_search::BoxFuture;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Constant vectors; fails any batch containing "poison" and rate limits
    /// the first `rate_limited` calls.
    #[derive(Default)]
    struct FakeEmbedder {
        rate_limited: usize,
        calls: AtomicUsize,
    }

    impl Embedder for FakeEmbedder {
        fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.rate_limited {
                    return Err(DocsiftError::RateLimited("429".into()));
                }
                if texts.iter().any(|t| t.contains("poison")) {
                    return Err(DocsiftError::Embedding("model rejected input".into()));
                }
                Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
            })
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        records: Mutex<Vec<IndexRecord>>,
        deleted: Mutex<Vec<String>>,
        documents: Mutex<Vec<Document>>,
        locked: HashSet<String>,
        indexed: Vec<String>,
    }

    impl IndexWriter for RecordingWriter {
        fn upsert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<usize>> {
            Box::pin(async move {
                let n = records.len();
                self.records.lock().unwrap().extend(records);
                Ok(n)
            })
        }

        fn delete_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<usize>> {
            Box::pin(async move {
                if self.locked.contains(source) {
                    return Err(DocsiftError::Database("database is locked".into()));
                }
                self.deleted.lock().unwrap().push(source.to_string());
                Ok(0)
            })
        }

        fn upsert_documents(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<usize>> {
            Box::pin(async move {
                let n = documents.len();
                self.documents.lock().unwrap().extend(documents);
                Ok(n)
            })
        }

        fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>>> {
            Box::pin(async move { Ok(self.indexed.clone()) })
        }
    }

    fn document(path: &str, content: &str) -> Document {
        Document {
            content: content.into(),
            meta: DocumentMeta {
                file_path: path.into(),
                framework: Framework::from_path(path),
                source_url: format!("https://docs.example.com/{path}"),
                title: path.into(),
                version: None,
            },
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            document("components.md", "# Components\n\nAll components.\n\n## Grid\n\nGrid overview."),
            document("components/grid.md", "# Grid\n\nGrid shows data.\n\n## Sorting\n\nSort rows."),
        ]
    }

    fn config(batch_size: usize) -> IngestConfig {
        IngestConfig {
            batch_size,
            batch_delay_ms: 0,
            ..IngestConfig::default()
        }
    }

    fn pipeline(
        batch_size: usize,
        embedder: Arc<FakeEmbedder>,
        writer: Arc<RecordingWriter>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(ChunkerConfig::default(), config(batch_size), embedder, writer)
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)))
    }

    #[tokio::test]
    async fn writes_linked_chunks_and_documents() {
        let writer = Arc::new(RecordingWriter::default());
        let report = pipeline(64, Arc::new(FakeEmbedder::default()), writer.clone())
            .ingest(corpus())
            .await
            .unwrap();

        assert!(report.is_complete(), "{report:?}");
        assert_eq!(report.documents, 2);
        assert_eq!(report.batches_written, 1);

        let records = writer.records.lock().unwrap();
        assert_eq!(records.len(), report.chunks);
        assert!(records.iter().all(|r| r.embedding.len() == 2));

        let ids: HashSet<&str> = records.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        for record in records.iter() {
            if let Some(parent) = &record.chunk.parent_id {
                assert!(ids.contains(parent.as_str()));
            }
        }
        let grid_root = records
            .iter()
            .find(|r| r.chunk.file_path == "components/grid.md" && r.ordinal == 0)
            .unwrap();
        assert!(grid_root.chunk.parent_id.is_some(), "linked into components.md");

        let mut deleted = writer.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(deleted, vec!["components.md", "components/grid.md"]);
        assert_eq!(writer.documents.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_batch_is_reported_and_others_written() {
        let writer = Arc::new(RecordingWriter::default());
        let mut docs = corpus();
        docs.push(document("bad.md", "# Bad\n\nThis chunk is poison."));

        let report = pipeline(1, Arc::new(FakeEmbedder::default()), writer.clone())
            .ingest(docs)
            .await
            .unwrap();

        assert_eq!(report.failed_batches.len(), 1);
        let failure = &report.failed_batches[0];
        assert_eq!(failure.chunk_ids.len(), 1);
        assert!(failure.error.contains("model rejected input"));
        assert_eq!(report.batches_written, report.chunks - 1);
        assert_eq!(report.failed_chunks(), 1);

        let records = writer.records.lock().unwrap();
        assert_eq!(records.len(), report.chunks - 1);
        assert!(records.iter().all(|r| !r.chunk.content.contains("poison")));
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let writer = Arc::new(RecordingWriter::default());
        let embedder = Arc::new(FakeEmbedder {
            rate_limited: 2,
            ..FakeEmbedder::default()
        });
        let report = pipeline(64, embedder.clone(), writer.clone())
            .ingest(corpus())
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(writer.records.lock().unwrap().len(), report.chunks);
    }

    #[tokio::test]
    async fn file_that_cannot_be_cleared_is_skipped() {
        let writer = Arc::new(RecordingWriter {
            locked: HashSet::from(["components/grid.md".to_string()]),
            ..RecordingWriter::default()
        });
        let report = pipeline(64, Arc::new(FakeEmbedder::default()), writer.clone())
            .ingest(corpus())
            .await
            .unwrap();

        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.failed_files[0].0, "components/grid.md");
        let records = writer.records.lock().unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.chunk.file_path == "components.md"));
        let stored = writer.documents.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].meta.file_path, "components.md");
    }

    #[tokio::test]
    async fn files_gone_from_the_docs_are_removed() {
        let writer = Arc::new(RecordingWriter {
            indexed: vec![
                "components.md".into(),
                "components/grid.md".into(),
                "components/old-grid.md".into(),
                "legacy/intro.md".into(),
            ],
            locked: HashSet::from(["legacy/intro.md".to_string()]),
            ..RecordingWriter::default()
        });
        let report = pipeline(64, Arc::new(FakeEmbedder::default()), writer.clone())
            .ingest(corpus())
            .await
            .unwrap();

        assert_eq!(report.removed_files, vec!["components/old-grid.md"]);
        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.failed_files[0].0, "legacy/intro.md");
        assert!(!report.is_complete());

        let mut deleted = writer.deleted.lock().unwrap().clone();
        deleted.sort();
        assert_eq!(
            deleted,
            vec!["components.md", "components/grid.md", "components/old-grid.md"]
        );
        assert_eq!(writer.records.lock().unwrap().len(), report.chunks);
    }

    #[tokio::test]
    async fn paths_are_normalised_before_writing() {
        let writer = Arc::new(RecordingWriter {
            indexed: vec!["components.md".into()],
            ..RecordingWriter::default()
        });
        let mut docs = corpus();
        docs[0].meta.file_path = "./components.md".into();
        let report = pipeline(64, Arc::new(FakeEmbedder::default()), writer.clone())
            .ingest(docs)
            .await
            .unwrap();

        assert!(report.is_complete(), "{report:?}");
        assert!(report.removed_files.is_empty());
        let records = writer.records.lock().unwrap();
        assert!(records.iter().any(|r| r.chunk.file_path == "components.md"));
        assert!(records.iter().all(|r| !r.chunk.file_path.starts_with("./")));
        let stored = writer.documents.lock().unwrap();
        assert!(stored.iter().any(|d| d.meta.file_path == "components.md"));
    }

    #[tokio::test]
    async fn empty_input_touches_nothing() {
        let writer = Arc::new(RecordingWriter::default());
        let embedder = Arc::new(FakeEmbedder::default());
        let report = pipeline(64, embedder.clone(), writer.clone())
            .ingest(Vec::new())
            .await
            .unwrap();

        assert_eq!(report, IngestReport::default());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(writer.deleted.lock().unwrap().is_empty());
    }
}
