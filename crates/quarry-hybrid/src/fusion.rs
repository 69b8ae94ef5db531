//! Weighted reciprocal-rank fusion over raw strategy scores.
//!
//! Each strategy contributes `weight / (K + score)` when its score is
//! positive; the fused rank is `1 - (keyword + semantic)`. Raw scores are
//! used, not rank positions.
use std::collections::HashMap;

use quarry_core::config::FusionOptions;
use quarry_core::types::{round4, ChunkId, CombinedResult, KeywordResult, VectorResult};

pub fn contribution(score: f64, weight: f64, rrf_k: f64) -> f64 {
    if score > 0.0 { weight / (rrf_k + score) } else { 0.0 }
}

pub fn rank(keyword_score: f64, semantic_score: f64, options: &FusionOptions) -> f64 {
    1.0 - (contribution(keyword_score, options.keyword_weight, options.rrf_k)
        + contribution(semantic_score, options.semantic_weight, options.rrf_k))
}

struct Candidate {
    id: ChunkId,
    title: String,
    text: String,
    keyword_score: f64,
    semantic_score: Option<f64>,
}

/// Merge both result sets into one ranking, one entry per id.
///
/// A side that did not return an id scores `0` for it. Output is sorted by
/// descending rank, ties by ascending id; `limit` keeps the top `n`.
pub fn fuse(keyword: &[KeywordResult], vector: &[VectorResult], limit: Option<usize>, options: &FusionOptions) -> Vec<CombinedResult> {
    let mut candidates: Vec<Candidate> = Vec::with_capacity(keyword.len() + vector.len());
    let mut positions: HashMap<ChunkId, usize> = HashMap::with_capacity(keyword.len() + vector.len());

    for hit in keyword {
        if positions.contains_key(&hit.id) { continue; }
        positions.insert(hit.id, candidates.len());
        candidates.push(Candidate {
            id: hit.id,
            title: hit.title.clone(),
            text: hit.text.clone(),
            keyword_score: f64::from(hit.score),
            semantic_score: None,
        });
    }
    for hit in vector {
        match positions.get(&hit.id) {
            Some(&pos) => {
                // first (best) vector hit per id wins
                let c = &mut candidates[pos];
                if c.semantic_score.is_none() { c.semantic_score = Some(f64::from(hit.similarity)); }
            }
            None => {
                positions.insert(hit.id, candidates.len());
                candidates.push(Candidate {
                    id: hit.id,
                    title: hit.title.clone(),
                    text: hit.text.clone(),
                    keyword_score: 0.0,
                    semantic_score: Some(f64::from(hit.similarity)),
                });
            }
        }
    }

    let mut ranked: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| (rank(c.keyword_score, c.semantic_score.unwrap_or(0.0), options), c))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    if let Some(n) = limit { ranked.truncate(n); }

    ranked
        .into_iter()
        .map(|(r, c)| CombinedResult {
            id: c.id,
            title: c.title,
            text: c.text,
            keyword_score: round4(c.keyword_score),
            semantic_score: round4(c.semantic_score.unwrap_or(0.0)),
            rank: round4(r),
        })
        .collect()
}
