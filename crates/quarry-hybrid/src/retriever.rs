use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use quarry_core::chunk_store::ChunkStore;
use quarry_core::config::{FusionOptions, Settings};
use quarry_core::traits::Embedder;
use quarry_core::types::{Chunk, CombinedResult, Score, VectorResult};
use quarry_core::{Error, Result};
use quarry_text::KeywordIndex;
use quarry_vector::store::{discard_staging, prepare_staging, swap_into_place, write_index};
use quarry_vector::{build_vector_index, embed_with_timeout, load_index, BuildOptions, BuildReport, EmbeddingCache, VectorIndex};

use crate::fusion::fuse;

pub const KEYWORD_FILE: &str = "keyword.json";
pub const VECTOR_DIR: &str = "vector";

/// Both indexes built from one chunk set, plus the embedder that produced the vectors.
pub struct IndexSet {
    pub keyword: Arc<KeywordIndex>,
    pub vector: Arc<VectorIndex>,
    pub embedder_id: String,
}

/// Hybrid retrieval over a keyword and a vector index.
///
/// Queries run against an `Arc<IndexSet>` snapshot; building or loading swaps
/// in a new set, and queries already in flight finish on the old one.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    settings: Settings,
    cache: Arc<EmbeddingCache>,
    indexes: RwLock<Option<Arc<IndexSet>>>,
    show_progress: bool,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, settings: Settings) -> Self {
        Self { embedder, settings, cache: Arc::new(EmbeddingCache::new()), indexes: RwLock::new(None), show_progress: false }
    }

    /// Show an embedding progress bar during builds.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    pub fn cache(&self) -> &EmbeddingCache { &self.cache }

    pub fn is_built(&self) -> bool { self.indexes.read().is_some() }

    /// The currently installed index set.
    pub fn indexes(&self) -> Result<Arc<IndexSet>> { self.indexes.read().clone().ok_or(Error::NotBuilt) }

    pub fn install(&self, set: IndexSet) { *self.indexes.write() = Some(Arc::new(set)); }

    pub async fn build_indexes(&self, store: &ChunkStore) -> Result<BuildReport> { self.build_from_chunks(store.chunks()).await }

    /// Build the keyword index on the blocking pool while the vector index is
    /// embedded, then install both.
    pub async fn build_from_chunks(&self, chunks: &[Chunk]) -> Result<BuildReport> {
        let started = Instant::now();
        info!("Building indexes over {} chunks", chunks.len());
        let keyword_task = {
            let chunks = chunks.to_vec();
            let options = self.settings.keyword.clone();
            tokio::task::spawn_blocking(move || KeywordIndex::build(&chunks, &options))
        };
        let mut options = BuildOptions::from(&self.settings.embedding);
        options.show_progress = self.show_progress;
        let vector_build = build_vector_index(chunks, Arc::clone(&self.embedder), &self.cache, &options);

        let (keyword, vector) = tokio::join!(keyword_task, vector_build);
        let keyword = keyword.map_err(join_err)??;
        let (vector, report) = vector?;
        self.install(IndexSet {
            keyword: Arc::new(keyword),
            vector: Arc::new(vector),
            embedder_id: self.embedder.model_id().to_string(),
        });
        info!(
            "Indexes ready in {:.1}s ({} keyword, {} vector, {} skipped)",
            started.elapsed().as_secs_f32(),
            chunks.len(),
            report.indexed(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<CombinedResult>> {
        self.search_with(query, limit, &self.settings.fusion).await
    }

    /// Keyword and semantic queries run concurrently; either failing fails the search.
    pub async fn search_with(&self, query: &str, limit: Option<usize>, options: &FusionOptions) -> Result<Vec<CombinedResult>> {
        let set = self.indexes()?;
        if query.trim().is_empty() { return Ok(Vec::new()); }
        let started = Instant::now();
        let keyword_task = {
            let set = Arc::clone(&set);
            let query = query.to_string();
            tokio::task::spawn_blocking(move || set.keyword.search(&query))
        };
        let semantic = self.vector_hits(&set, query, self.settings.search.semantic_candidates);

        let (keyword, semantic) = tokio::join!(keyword_task, semantic);
        let keyword = keyword.map_err(join_err)??;
        let semantic = semantic?;
        let fused = fuse(&keyword, &semantic, limit.or(self.settings.search.default_limit), options);
        debug!(
            "search {:?}: {} keyword + {} semantic -> {} fused in {} ms",
            query,
            keyword.len(),
            semantic.len(),
            fused.len(),
            started.elapsed().as_millis()
        );
        Ok(fused)
    }

    /// Keyword-only search; works while the embedding provider is unavailable.
    pub fn keyword_search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Score>> {
        let set = self.indexes()?;
        if query.trim().is_empty() { return Ok(Vec::new()); }
        let mut hits = set.keyword.search(query)?;
        if let Some(n) = limit { hits.truncate(n); }
        Ok(hits.into_iter().map(Score::from_keyword).collect())
    }

    /// Nearest chunks by embedding; `limit` defaults to `search.semantic_candidates`.
    pub async fn semantic_search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Score>> {
        let set = self.indexes()?;
        if query.trim().is_empty() { return Ok(Vec::new()); }
        let k = limit.unwrap_or(self.settings.search.semantic_candidates);
        let hits = self.vector_hits(&set, query, k).await?;
        Ok(hits.into_iter().map(Score::from_vector).collect())
    }

    async fn vector_hits(&self, set: &IndexSet, query: &str, k: usize) -> Result<Vec<VectorResult>> {
        let timeout = Duration::from_secs(self.settings.embedding.timeout_secs);
        let embedding = embed_with_timeout(Arc::clone(&self.embedder), query.to_string(), timeout).await?;
        set.vector.query(&embedding, k)
    }

    /// Write `keyword.json` and `vector/` under `dir`, replacing its contents.
    ///
    /// Both parts go to a staging sibling first; `dir` is swapped only once
    /// both are written, so a failed save keeps the previous pair intact.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        let set = self.indexes()?;
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Persistence(format!("{}: {}", parent.display(), e)))?;
        }
        let staging = prepare_staging(dir)?;
        let written = async {
            set.keyword.save(&staging.join(KEYWORD_FILE))?;
            write_index(&set.vector, &set.embedder_id, &staging.join(VECTOR_DIR)).await
        }
        .await;
        if let Err(e) = written {
            discard_staging(&staging);
            return Err(e);
        }
        swap_into_place(&staging, dir)?;
        info!("Saved indexes to {}", dir.display());
        Ok(())
    }

    /// Load both indexes from `dir` and install them.
    pub async fn load(&self, dir: &Path) -> Result<()> {
        let keyword_task = {
            let path = dir.join(KEYWORD_FILE);
            tokio::task::spawn_blocking(move || KeywordIndex::load(&path))
        };
        let vector_dir = dir.join(VECTOR_DIR);
        let (keyword, vector) = tokio::join!(keyword_task, load_index(&vector_dir));
        let keyword = keyword.map_err(join_err)??;
        let (vector, manifest) = vector?;
        if manifest.embedder_id != self.embedder.model_id() {
            warn!(
                "Vector index at {} was built with {}, active embedder is {}",
                vector_dir.display(),
                manifest.embedder_id,
                self.embedder.model_id()
            );
        }
        if keyword.len() != vector.len() {
            warn!("Keyword index holds {} chunks, vector index {}", keyword.len(), vector.len());
        }
        self.install(IndexSet { keyword: Arc::new(keyword), vector: Arc::new(vector), embedder_id: manifest.embedder_id });
        info!("Loaded indexes from {}", dir.display());
        Ok(())
    }
}

fn join_err(err: JoinError) -> Error { Error::Operation(format!("background task failed: {err}")) }
