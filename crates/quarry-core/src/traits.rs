use crate::error::Result;

/// Maps text to a fixed-length vector.
///
/// Every vector returned by one implementation has length `dim()`. Failures
/// (network, timeout, quota, model errors) are reported as `Error::Embedding`.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the provider and model, e.g. `ollama:nomic-embed-text`.
    fn model_id(&self) -> &str;
    /// Embedding dimensionality, or `None` until the provider has produced a vector.
    fn dim(&self) -> Option<usize>;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
