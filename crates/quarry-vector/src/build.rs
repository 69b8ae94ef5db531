use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use quarry_core::config::EmbeddingOptions;
use quarry_core::traits::Embedder;
use quarry_core::types::{Chunk, ChunkId};
use quarry_core::{Error, Result};

use crate::cache::EmbeddingCache;
use crate::index::{EntryMetadata, VectorIndex};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Chunks embedded concurrently per round.
    pub batch_size: usize,
    /// Per-chunk embedding deadline.
    pub timeout: Duration,
    pub show_progress: bool,
}

impl From<&EmbeddingOptions> for BuildOptions {
    fn from(options: &EmbeddingOptions) -> Self {
        Self { batch_size: options.batch_size, timeout: Duration::from_secs(options.timeout_secs), show_progress: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChunk {
    pub id: ChunkId,
    pub title: String,
    pub reason: String,
}

/// Outcome of a vector build; `embedded + cached + skipped.len() == chunks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub chunks: usize,
    pub embedded: usize,
    pub cached: usize,
    pub skipped: Vec<SkippedChunk>,
}

impl BuildReport {
    pub fn indexed(&self) -> usize { self.embedded + self.cached }
}

/// Embed every chunk and collect the vectors into a fresh index.
///
/// Chunks whose embedding fails or times out are skipped and reported; a
/// vector whose length disagrees with the index aborts the build.
pub async fn build_vector_index(
    chunks: &[Chunk],
    embedder: Arc<dyn Embedder>,
    cache: &EmbeddingCache,
    options: &BuildOptions,
) -> Result<(VectorIndex, BuildReport)> {
    let model_id = embedder.model_id().to_string();
    info!("Embedding {} chunks with {} (batch size {})", chunks.len(), model_id, options.batch_size);
    let mut index = VectorIndex::new();
    let mut report = BuildReport { chunks: chunks.len(), ..BuildReport::default() };
    let pb = progress_bar(chunks.len(), options.show_progress);

    for batch in chunks.chunks(options.batch_size.max(1)) {
        let mut pending = Vec::with_capacity(batch.len());
        for chunk in batch {
            match cache.get(&chunk.text, &model_id) {
                Some(vector) => {
                    index.insert(chunk.id, vector, metadata(chunk))?;
                    report.cached += 1;
                    pb.inc(1);
                }
                None => pending.push(chunk),
            }
        }

        let outcomes = join_all(pending.iter().map(|c| embed_with_timeout(Arc::clone(&embedder), c.text.clone(), options.timeout))).await;
        for (chunk, outcome) in pending.into_iter().zip(outcomes) {
            match outcome {
                Ok(vector) => {
                    cache.put(&chunk.text, &model_id, vector.clone());
                    index.insert(chunk.id, vector, metadata(chunk))?;
                    report.embedded += 1;
                }
                Err(e @ Error::DimensionMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!("Skipping chunk {} ({}): {}", chunk.id, chunk.title, e);
                    report.skipped.push(SkippedChunk { id: chunk.id, title: chunk.title.clone(), reason: e.to_string() });
                }
            }
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    info!(
        "Vector index built: {} embedded, {} cached, {} skipped",
        report.embedded,
        report.cached,
        report.skipped.len()
    );
    Ok((index, report))
}

/// Run the blocking `embed` call on the blocking pool, bounded by `timeout`.
pub async fn embed_with_timeout(embedder: Arc<dyn Embedder>, text: String, timeout: Duration) -> Result<Vec<f32>> {
    let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(Error::Embedding(format!("timed out after {}s", timeout.as_secs_f32()))),
        Ok(Err(join)) => Err(Error::Operation(format!("embedding task failed: {join}"))),
        Ok(Ok(result)) => result,
    }
}

fn metadata(chunk: &Chunk) -> EntryMetadata {
    EntryMetadata { title: chunk.title.clone(), text: chunk.text.clone() }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible { return ProgressBar::hidden(); }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
