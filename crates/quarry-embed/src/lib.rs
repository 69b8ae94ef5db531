//! quarry-embed
//!
//! Embedding providers behind `quarry_core::traits::Embedder`: a local BGE-M3
//! model on candle, an Ollama HTTP client and a deterministic hashing embedder.

pub mod device;
pub mod hash;
pub mod model;
pub mod ollama;
pub mod pool;
pub mod tokenize;
pub mod unavailable;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use quarry_core::config::{EmbeddingOptions, EmbeddingProviderKind};
use quarry_core::traits::Embedder;
use quarry_core::{Error, Result};

pub use hash::HashEmbedder;
pub use model::{resolve_model_dir, BgeM3Embedder};
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;
pub use unavailable::UnavailableEmbedder;

/// Construct the embedder selected by `options.provider`.
pub fn get_default_embedder(options: &EmbeddingOptions) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match options.provider {
        EmbeddingProviderKind::Hash => Arc::new(HashEmbedder::new(options.hash_dim)),
        EmbeddingProviderKind::Ollama => {
            Arc::new(OllamaEmbedder::new(&options.endpoint, &options.model, Duration::from_secs(options.timeout_secs))?)
        }
        EmbeddingProviderKind::Local => {
            let dir = resolve_model_dir(options.model_dir.as_deref()).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            Arc::new(BgeM3Embedder::load(&dir).map_err(|e| Error::embedding(format!("{e:#}")))?)
        }
    };
    info!("Using embedder {}", embedder.model_id());
    Ok(embedder)
}
