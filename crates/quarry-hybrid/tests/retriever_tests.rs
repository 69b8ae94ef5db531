use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quarry_core::chunk_store::ChunkStore;
use quarry_core::config::{FusionOptions, Settings};
use quarry_core::traits::Embedder;
use quarry_core::types::SourceKind;
use quarry_core::{Error, Result};
use quarry_embed::{HashEmbedder, UnavailableEmbedder};
use quarry_hybrid::Retriever;
use quarry_vector::store::staging_path;
use tempfile::TempDir;

fn store() -> ChunkStore {
    let mut store = ChunkStore::new();
    store.push_document("fire", ["Build a small fire with dry kindling.", "Feed the fire with larger logs once it catches."]);
    store.push_document("water", ["Boil water for one minute before drinking.", "Filter cloudy water through cloth first."]);
    store.push_document("knots", ["The bowline knot forms a fixed loop."]);
    store
}

/// Hash embeddings, with a call counter and an optional outage.
struct TestEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    down: bool,
}

impl TestEmbedder {
    fn up() -> Arc<Self> { Arc::new(Self { inner: HashEmbedder::new(64), calls: AtomicUsize::new(0), down: false }) }
    fn down() -> Arc<Self> { Arc::new(Self { inner: HashEmbedder::new(64), calls: AtomicUsize::new(0), down: true }) }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl Embedder for TestEmbedder {
    fn model_id(&self) -> &str { "test:64" }
    fn dim(&self) -> Option<usize> { Some(64) }
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down { return Err(Error::Embedding("connection refused".to_string())); }
        Ok(self.inner.embed_text(text))
    }
}

/// Hash embeddings that block for `delay` on texts containing "slow".
struct SlowEmbedder {
    inner: HashEmbedder,
    delay: Duration,
}

impl Embedder for SlowEmbedder {
    fn model_id(&self) -> &str { "test:64" }
    fn dim(&self) -> Option<usize> { Some(64) }
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("slow") { std::thread::sleep(self.delay); }
        Ok(self.inner.embed_text(text))
    }
}

async fn built_slow(delay: Duration) -> Retriever {
    let mut settings = Settings::default();
    settings.embedding.timeout_secs = 1;
    let retriever = Retriever::new(Arc::new(SlowEmbedder { inner: HashEmbedder::new(64), delay }), settings);
    retriever.build_indexes(&store()).await.expect("build");
    retriever
}

async fn built(embedder: Arc<TestEmbedder>) -> Retriever {
    let retriever = Retriever::new(embedder, Settings::default());
    retriever.build_indexes(&store()).await.expect("build");
    retriever
}

#[tokio::test]
async fn queries_before_build_are_not_built() {
    let retriever = Retriever::new(TestEmbedder::up(), Settings::default());
    assert!(!retriever.is_built());
    assert!(matches!(retriever.search("fire", None).await, Err(Error::NotBuilt)));
    assert!(matches!(retriever.keyword_search("fire", None), Err(Error::NotBuilt)));
    assert!(matches!(retriever.semantic_search("fire", None).await, Err(Error::NotBuilt)));
    assert!(matches!(retriever.save(std::path::Path::new("unused")).await, Err(Error::NotBuilt)));
}

#[tokio::test]
async fn hybrid_search_fuses_both_strategies() -> Result<()> {
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    let set = retriever.indexes()?;
    assert_eq!(set.keyword.len(), 5);
    assert_eq!(set.vector.len(), 5);

    let results = retriever.search("boil water", None).await?;
    // every chunk comes back from the vector side, so the union covers the corpus
    assert_eq!(results.len(), 5);
    for pair in results.windows(2) { assert!(pair[0].rank >= pair[1].rank); }
    let boil = results.iter().find(|r| r.id == 3).expect("boil chunk present");
    assert!(boil.keyword_score > 0.0);
    assert!(boil.semantic_score > 0.0);
    assert!(boil.rank < 1.0);

    let top = retriever.search("boil water", Some(3)).await?;
    assert_eq!(top, results[..3].to_vec());
    Ok(())
}

#[tokio::test]
async fn search_with_custom_weights_is_respected() -> Result<()> {
    let retriever = built(TestEmbedder::up()).await;
    let keyword_only = FusionOptions { semantic_weight: 0.0, ..FusionOptions::default() };
    let results = retriever.search_with("kindling", None, &keyword_only).await?;
    // with no semantic weight, non-matching chunks rank exactly 1
    let kindling = results.iter().find(|r| r.id == 1).expect("kindling chunk");
    assert!(kindling.rank < 1.0);
    assert!(results.iter().filter(|r| r.id != 1).all(|r| r.rank == 1.0));
    Ok(())
}

#[tokio::test]
async fn keyword_search_survives_an_embedding_outage() -> Result<()> {
    let embedder = TestEmbedder::down();
    let retriever = Retriever::new(embedder.clone(), Settings::default());
    let report = retriever.build_indexes(&store()).await?;
    assert_eq!(report.chunks, 5);
    assert_eq!(report.skipped.len(), 5);
    assert_eq!(report.indexed(), 0);

    let hits = retriever.keyword_search("bowline", None)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 5);
    assert_eq!(hits[0].source, SourceKind::Keyword);
    let calls = embedder.calls();

    assert!(matches!(retriever.search("bowline", None).await, Err(Error::Embedding(_))));
    assert!(matches!(retriever.semantic_search("bowline", None).await, Err(Error::Embedding(_))));
    assert_eq!(embedder.calls(), calls + 2);
    Ok(())
}

#[tokio::test]
async fn empty_queries_do_not_embed() -> Result<()> {
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    let calls = embedder.calls();
    assert!(retriever.search("", None).await?.is_empty());
    assert!(retriever.search("   ", Some(5)).await?.is_empty());
    assert!(retriever.semantic_search("", None).await?.is_empty());
    assert!(retriever.keyword_search("", None)?.is_empty());
    assert_eq!(embedder.calls(), calls);
    Ok(())
}

#[tokio::test]
async fn semantic_search_limits() -> Result<()> {
    let mut store = ChunkStore::new();
    let pieces: Vec<String> = (0..15).map(|i| format!("passage {i} about camp cooking")).collect();
    store.push_document("camp", pieces);
    let retriever = Retriever::new(TestEmbedder::up(), Settings::default());
    retriever.build_indexes(&store).await?;

    assert_eq!(retriever.semantic_search("camp cooking", None).await?.len(), 10);
    let three = retriever.semantic_search("camp cooking", Some(3)).await?;
    assert_eq!(three.len(), 3);
    assert!(three.iter().all(|s| s.source == SourceKind::Semantic));
    for pair in three.windows(2) { assert!(pair[0].rank >= pair[1].rank); }
    assert_eq!(retriever.keyword_search("camp", Some(4))?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn save_and_load_reproduce_results() -> Result<()> {
    let tmp = TempDir::new().map_err(Error::persistence)?;
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    retriever.save(tmp.path()).await?;

    let restored = Retriever::new(embedder, Settings::default());
    restored.load(tmp.path()).await?;
    assert!(restored.is_built());
    for q in ["fire logs", "cloudy water", "loop"] {
        assert_eq!(retriever.search(q, None).await?, restored.search(q, None).await?, "query {q}");
        assert_eq!(retriever.keyword_search(q, None)?, restored.keyword_search(q, None)?);
    }
    Ok(())
}

#[tokio::test]
async fn failed_load_leaves_retriever_untouched() {
    let tmp = TempDir::new().unwrap();
    let retriever = Retriever::new(TestEmbedder::up(), Settings::default());
    assert!(matches!(retriever.load(tmp.path()).await, Err(Error::Persistence(_))));
    assert!(!retriever.is_built());
}

#[tokio::test]
async fn rebuild_swaps_the_index_set() -> Result<()> {
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    let before = retriever.indexes()?;

    let mut smaller = ChunkStore::new();
    smaller.push_document("only", ["a single chunk about tarps"]);
    retriever.build_indexes(&smaller).await?;

    assert_eq!(before.keyword.len(), 5, "old snapshot is unchanged");
    assert_eq!(retriever.indexes()?.keyword.len(), 1);
    assert_eq!(retriever.keyword_search("tarps", None)?.len(), 1);
    assert!(retriever.keyword_search("bowline", None)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rebuilding_unchanged_chunks_hits_the_cache() -> Result<()> {
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    let calls = embedder.calls();
    let report = retriever.build_indexes(&store()).await?;
    assert_eq!(report.cached, 5);
    assert_eq!(embedder.calls(), calls);
    Ok(())
}

#[tokio::test]
async fn query_embedding_timeout_fails_with_embedding_error() -> Result<()> {
    let retriever = built_slow(Duration::from_millis(1500)).await;
    assert!(matches!(retriever.search("slow fire", None).await, Err(Error::Embedding(_))));
    assert!(matches!(retriever.semantic_search("slow fire", None).await, Err(Error::Embedding(_))));
    assert_eq!(retriever.keyword_search("slow fire", None)?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn dropped_search_leaves_the_index_usable() -> Result<()> {
    let retriever = built_slow(Duration::from_millis(500)).await;
    let before = retriever.search("fire", None).await?;

    let abandoned = tokio::time::timeout(Duration::from_millis(50), retriever.search("slow fire", None)).await;
    assert!(abandoned.is_err(), "search should still be waiting on the embedder");

    assert!(retriever.is_built());
    assert_eq!(retriever.indexes()?.vector.len(), 5);
    assert_eq!(retriever.search("fire", None).await?, before);
    Ok(())
}

#[tokio::test]
async fn failed_save_keeps_the_in_memory_index() -> Result<()> {
    let tmp = TempDir::new().map_err(Error::persistence)?;
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").map_err(Error::persistence)?;
    let retriever = built(TestEmbedder::up()).await;

    assert!(matches!(retriever.save(&blocker.join("indexes")).await, Err(Error::Persistence(_))));
    assert!(retriever.is_built());
    assert!(!retriever.search("bowline", None).await?.is_empty());
    assert_eq!(retriever.keyword_search("bowline", None)?[0].id, 5);
    Ok(())
}

#[tokio::test]
async fn failed_save_keeps_the_previous_pair_on_disk() -> Result<()> {
    let tmp = TempDir::new().map_err(Error::persistence)?;
    let dir = tmp.path().join("indexes");
    let embedder = TestEmbedder::up();
    let retriever = built(embedder.clone()).await;
    retriever.save(&dir).await?;

    let mut smaller = ChunkStore::new();
    smaller.push_document("only", ["a single chunk about tarps"]);
    retriever.build_indexes(&smaller).await?;
    std::fs::write(staging_path(&dir)?, b"in the way").map_err(Error::persistence)?;
    assert!(matches!(retriever.save(&dir).await, Err(Error::Persistence(_))));

    let restored = Retriever::new(embedder, Settings::default());
    restored.load(&dir).await?;
    let set = restored.indexes()?;
    assert_eq!(set.keyword.len(), 5);
    assert_eq!(set.vector.len(), 5);
    Ok(())
}

#[tokio::test]
async fn saved_keyword_index_loads_without_an_embedding_provider() -> Result<()> {
    let tmp = TempDir::new().map_err(Error::persistence)?;
    built(TestEmbedder::up()).await.save(tmp.path()).await?;

    let offline = Retriever::new(Arc::new(UnavailableEmbedder::new("no model directory")), Settings::default());
    offline.load(tmp.path()).await?;
    let hits = offline.keyword_search("bowline", None)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 5);
    assert!(matches!(offline.search("bowline", None).await, Err(Error::Embedding(_))));
    Ok(())
}
