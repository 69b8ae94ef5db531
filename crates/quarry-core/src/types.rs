//! Domain types shared by the keyword, vector and fusion layers.

use serde::{Deserialize, Serialize};

/// 1-based chunk identifier, unique across the whole corpus.
pub type ChunkId = u64;

/// A bounded slice of a source document; the unit of indexing and retrieval.
///
/// - `id`: join key across both indexes
/// - `title`: identifier of the source document (file stem)
/// - `text`: the chunk payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub title: String,
    pub text: String,
}

/// Indicates which strategy produced a single-strategy result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Keyword,
    Semantic,
}

/// A keyword index hit. `score` is non-negative and unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub id: ChunkId,
    pub score: f32,
    pub title: String,
    pub text: String,
}

/// A vector index hit. `similarity` is cosine similarity in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorResult {
    pub id: ChunkId,
    pub similarity: f32,
    pub title: String,
    pub text: String,
}

/// One entry of a fused ranking.
///
/// The side that did not return the chunk contributes a score of `0`.
/// `rank` is a comparator output, not a probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub id: ChunkId,
    pub title: String,
    pub text: String,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub rank: f64,
}

/// Output of a single-strategy search: the strategy's own score, rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: ChunkId,
    pub rank: f64,
    pub title: String,
    pub text: String,
    pub source: SourceKind,
}

impl Score {
    pub fn from_keyword(hit: KeywordResult) -> Self {
        Self { id: hit.id, rank: round4(f64::from(hit.score)), title: hit.title, text: hit.text, source: SourceKind::Keyword }
    }

    pub fn from_vector(hit: VectorResult) -> Self {
        Self { id: hit.id, rank: round4(f64::from(hit.similarity)), title: hit.title, text: hit.text, source: SourceKind::Semantic }
    }
}

/// Round to 4 decimal digits for display stability.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
