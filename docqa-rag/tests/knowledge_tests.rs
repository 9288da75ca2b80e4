//! Ingestion, deletion and reconciliation tests for the knowledge base.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::config::RagConfig;
use docqa_rag::convert::{Converter, ConverterRegistry, DocumentFormat};
use docqa_rag::document::{QueryResult, VectorEntry};
use docqa_rag::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use docqa_rag::error::{ConversionError, IngestError, RagError, Result};
use docqa_rag::inmemory::InMemoryVectorIndex;
use docqa_rag::knowledge::{KnowledgeBase, Reconcile, UploadedFile};
use docqa_rag::vectorstore::{QueryInput, VectorIndex};

const KAJMAK: &str = "Kajmak is a creamy dairy product popular in the Balkans.";

/// Returns a fixed text and counts how often it was called.
struct CountingConverter {
    text: &'static str,
    calls: AtomicUsize,
}

impl CountingConverter {
    fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self { text, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Converter for CountingConverter {
    async fn convert(
        &self,
        _path: &Path,
        _format: DocumentFormat,
    ) -> std::result::Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

/// An in-memory index whose inserts can be made to fail.
#[derive(Default)]
struct FlakyIndex {
    inner: InMemoryVectorIndex,
    fail_adds: AtomicBool,
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn add(&self, collection: &str, entry: VectorEntry) -> Result<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(RagError::VectorStoreError {
                backend: "Flaky".into(),
                message: "insert rejected".into(),
            });
        }
        self.inner.add(collection, entry).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        self.inner.delete_all(collection).await
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        self.inner.ids(collection).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<VectorEntry>> {
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        input: QueryInput<'_>,
        top_k: usize,
    ) -> Result<QueryResult> {
        self.inner.query(collection, input, top_k).await
    }
}

/// Fails every embedding request.
struct OfflineEmbedder;

#[async_trait]
impl EmbeddingProvider for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "Offline".into(), message: "unreachable".into() })
    }

    fn dimensions(&self) -> usize {
        512
    }
}

async fn knowledge_base(index: Arc<dyn VectorIndex>) -> KnowledgeBase {
    KnowledgeBase::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(index)
        .build()
        .await
        .unwrap()
}

async fn knowledge_base_with(
    index: Arc<dyn VectorIndex>,
    converters: ConverterRegistry,
) -> KnowledgeBase {
    KnowledgeBase::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(index)
        .converters(converters)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn text_upload_is_stored_and_indexed() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;

    let record = kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();
    assert_eq!(record.id, "kajmak.txt");
    assert_eq!(record.format, DocumentFormat::Txt);
    assert_eq!(record.word_count(), 10);

    assert_eq!(kb.len().await, 1);
    assert_eq!(index.ids("docs").await.unwrap(), ["kajmak.txt"]);
}

#[tokio::test]
async fn querying_with_a_stored_text_returns_it_first() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;
    kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();
    kb.ingest("rust.txt", b"Rust guarantees memory safety without a garbage collector.")
        .await
        .unwrap();

    let results = kb.search(KAJMAK, 3).await.unwrap();
    assert_eq!(results.ids()[0], "kajmak.txt");
    assert!(results.distances()[0].abs() < 1e-5);
}

#[tokio::test]
async fn oversized_upload_is_rejected_without_side_effects() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;

    let bytes = vec![b'a'; 10 * 1024 * 1024 + 1];
    let err = kb.ingest("big.txt", &bytes).await.unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { size, limit, .. }
        if size == 10 * 1024 * 1024 + 1 && limit == 10 * 1024 * 1024));
    assert!(kb.is_empty().await);
    assert!(index.ids("docs").await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_at_the_limit_is_accepted() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;
    let bytes = vec![b'a'; 10 * 1024 * 1024];
    assert!(kb.ingest("limit.txt", &bytes).await.is_ok());
}

#[tokio::test]
async fn unsupported_extension_never_reaches_a_converter() {
    let converter = CountingConverter::new(KAJMAK);
    let mut registry = ConverterRegistry::empty();
    for format in DocumentFormat::ALL {
        registry = registry.register(format, converter.clone());
    }
    let kb = knowledge_base_with(Arc::new(InMemoryVectorIndex::new()), registry).await;

    let err = kb.ingest("data.csv", b"a,b,c\n1,2,3\n").await.unwrap_err();
    match err {
        IngestError::UnsupportedType { filename, extension } => {
            assert_eq!(filename, "data.csv");
            assert_eq!(extension, "csv");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    assert!(kb.is_empty().await);

    kb.ingest("REPORT.PDF", b"%PDF-1.4").await.unwrap();
    assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn short_text_is_reported_as_empty_or_corrupt() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;

    let err = kb.ingest("tiny.txt", b"  short  \n").await.unwrap_err();
    assert_eq!(err.to_string(), "tiny.txt: File appears to be empty or corrupted");
    assert!(kb.is_empty().await);
}

#[tokio::test]
async fn missing_converter_is_a_conversion_failure() {
    let kb =
        knowledge_base_with(Arc::new(InMemoryVectorIndex::new()), ConverterRegistry::empty())
            .await;

    let err = kb.ingest("notes.txt", KAJMAK.as_bytes()).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::ConversionFailed { source: ConversionError::Unsupported(_), .. }
    ));
}

#[tokio::test]
async fn failed_index_insert_leaves_store_untouched() {
    let index = Arc::new(FlakyIndex::default());
    let kb = knowledge_base(index.clone()).await;
    kb.ingest("kept.txt", b"This document stays in place.").await.unwrap();

    index.fail_adds.store(true, Ordering::SeqCst);
    let err = kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap_err();
    assert!(matches!(err, IngestError::Indexing { .. }));
    assert_eq!(err.filename(), "kajmak.txt");

    let ids: Vec<String> = kb.documents().await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["kept.txt"]);
    assert_eq!(index.ids("docs").await.unwrap(), ["kept.txt"]);
}

#[tokio::test]
async fn failed_embedding_leaves_store_and_index_empty() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = KnowledgeBase::builder()
        .embedding_provider(Arc::new(OfflineEmbedder))
        .vector_index(index.clone())
        .build()
        .await
        .unwrap();

    let err = kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Indexing { source: RagError::EmbeddingError { .. }, .. }
    ));
    assert!(kb.is_empty().await);
    assert!(index.ids("docs").await.unwrap().is_empty());
}

#[tokio::test]
async fn text_without_words_is_not_indexed() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;

    let err = kb.ingest("rule.txt", b"------------------------").await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Indexing { source: RagError::EmbeddingError { .. }, .. }
    ));
    assert!(kb.is_empty().await);
    assert!(index.ids("docs").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_snapshot_write_keeps_store_and_index_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = Arc::new(InMemoryVectorIndex::persistent(&path).await.unwrap());
    let kb = knowledge_base(index.clone()).await;
    kb.ingest("kept.txt", b"This document stays in place.").await.unwrap();

    // A directory where the temporary snapshot goes makes every write fail.
    std::fs::create_dir(dir.path().join("index.json.tmp")).unwrap();

    let err = kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap_err();
    assert!(matches!(err, IngestError::Indexing { .. }));
    assert!(kb.document("kajmak.txt").await.is_none());
    assert_eq!(index.ids("docs").await.unwrap(), ["kept.txt"]);
    let results = kb.search(KAJMAK, 3).await.unwrap();
    assert_eq!(results.ids(), ["kept.txt"]);

    assert!(kb.delete("kept.txt").await.is_err());
    assert!(kb.document("kept.txt").await.is_some());
    assert_eq!(index.ids("docs").await.unwrap(), ["kept.txt"]);
}

#[tokio::test]
async fn batch_reports_each_file_independently() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;
    let files = [
        UploadedFile::new("kajmak.txt", KAJMAK),
        UploadedFile::new("sheet.xlsx", b"PK".to_vec()),
        UploadedFile::new("blank.txt", "   "),
        UploadedFile::new("rust.txt", "Rust guarantees memory safety."),
    ];

    let report = kb.ingest_batch(&files).await;
    let ids: Vec<&str> = report.ingested.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["kajmak.txt", "rust.txt"]);
    assert_eq!(report.total_words(), 14);
    assert_eq!(report.failure_count(), 2);
    assert_eq!(
        report.failure_messages(),
        [
            "sheet.xlsx: Unsupported file type 'xlsx'",
            "blank.txt: File appears to be empty or corrupted",
        ]
    );
}

#[tokio::test]
async fn reingesting_an_id_replaces_the_document() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;

    kb.ingest("notes.txt", b"The first version of the notes.").await.unwrap();
    kb.ingest("notes.txt", b"The second version of the notes.").await.unwrap();

    assert_eq!(kb.len().await, 1);
    let record = kb.document("notes.txt").await.unwrap();
    assert!(record.text.contains("second"));
    let entry = index.get("docs", "notes.txt").await.unwrap().unwrap();
    assert_eq!(entry.text, record.text);
}

#[tokio::test]
async fn delete_removes_from_store_and_index() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;
    kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();
    kb.ingest("rust.txt", b"Rust guarantees memory safety.").await.unwrap();

    assert!(kb.delete("kajmak.txt").await.unwrap());
    assert!(kb.document("kajmak.txt").await.is_none());
    assert!(index.get("docs", "kajmak.txt").await.unwrap().is_none());

    let results = kb.search(KAJMAK, 3).await.unwrap();
    assert!(!results.ids().iter().any(|id| id == "kajmak.txt"));
}

#[tokio::test]
async fn deleting_an_unknown_id_is_a_no_op() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;
    kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();

    assert!(!kb.delete("missing.txt").await.unwrap());
    assert_eq!(kb.len().await, 1);
}

#[tokio::test]
async fn add_text_generates_an_id_when_none_is_given() {
    let kb = knowledge_base(Arc::new(InMemoryVectorIndex::new())).await;

    let record = kb.add_text(None, KAJMAK).await.unwrap();
    assert_eq!(record.id.len(), 36);
    assert_eq!(record.format, DocumentFormat::Txt);

    let named = kb.add_text(Some("guide.pdf".into()), "Some extracted text.").await.unwrap();
    assert_eq!(named.format, DocumentFormat::Pdf);
    assert_eq!(kb.len().await, 2);
}

#[tokio::test]
async fn reset_clears_both_sides() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;
    kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();

    kb.reset().await.unwrap();
    assert!(kb.is_empty().await);
    assert!(index.ids("docs").await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_adopts_entries_from_a_reopened_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    {
        let index = Arc::new(InMemoryVectorIndex::persistent(&path).await.unwrap());
        let kb = knowledge_base(index).await;
        kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();
    }

    let index = Arc::new(InMemoryVectorIndex::persistent(&path).await.unwrap());
    let kb = knowledge_base(index).await;
    assert!(kb.is_empty().await);

    let adopted = kb.reconcile(Reconcile::Adopt).await.unwrap();
    assert_eq!(adopted, ["kajmak.txt"]);
    let record = kb.document("kajmak.txt").await.unwrap();
    assert_eq!(record.text, KAJMAK);
    assert!(kb.reconcile(Reconcile::Adopt).await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_prunes_orphaned_entries() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let kb = knowledge_base(index.clone()).await;
    kb.ingest("kajmak.txt", KAJMAK.as_bytes()).await.unwrap();
    index
        .add("docs", VectorEntry { id: "stray".into(), embedding: vec![0.0; 512], text: "x".into() })
        .await
        .unwrap();

    let pruned = kb.reconcile(Reconcile::Prune).await.unwrap();
    assert_eq!(pruned, ["stray"]);
    assert_eq!(index.ids("docs").await.unwrap(), ["kajmak.txt"]);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_build() {
    let config = RagConfig { top_k: 0, ..RagConfig::default() };
    let result = KnowledgeBase::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(Arc::new(InMemoryVectorIndex::new()))
        .build()
        .await;
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}
