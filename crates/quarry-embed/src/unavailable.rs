use quarry_core::traits::Embedder;
use quarry_core::{Error, Result};

/// Stands in for a provider that failed to start; every call fails with
/// `Error::Embedding`, leaving keyword-only operations usable.
#[derive(Debug, Clone)]
pub struct UnavailableEmbedder {
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(reason: impl Into<String>) -> Self { Self { reason: reason.into() } }

    pub fn reason(&self) -> &str { &self.reason }
}

impl Embedder for UnavailableEmbedder {
    fn model_id(&self) -> &str { "unavailable" }
    fn dim(&self) -> Option<usize> { None }
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Embedding(format!("embedding provider unavailable: {}", self.reason)))
    }
}
