use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use quarry_core::traits::Embedder;
use quarry_core::{Error, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from an Ollama server's `/api/embeddings` endpoint.
///
/// The dimension is learned from the first response; later responses of a
/// different length are rejected.
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    model_id: String,
    dim: OnceLock<usize>,
}

impl OllamaEmbedder {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build().map_err(Error::embedding)?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            model_id: format!("ollama:{model}"),
            dim: OnceLock::new(),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> Option<usize> { self.dim.get().copied() }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest { model: &self.model, prompt: text })
            .send()
            .map_err(|e| Error::Embedding(format!("request to {} failed: {e}", self.url)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Embedding(format!("{} returned {status}: {body}", self.url)));
        }
        let parsed: EmbeddingResponse = response.json().map_err(Error::embedding)?;
        if parsed.embedding.is_empty() { return Err(Error::Embedding("empty embedding in response".to_string())); }
        let expected = *self.dim.get_or_init(|| parsed.embedding.len());
        if parsed.embedding.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: parsed.embedding.len() });
        }
        debug!("ollama embedded {} chars -> {} dims", text.len(), expected);
        Ok(parsed.embedding)
    }
}
