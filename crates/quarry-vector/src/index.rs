use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use quarry_core::types::{ChunkId, VectorResult};
use quarry_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: ChunkId,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// Flat in-memory cosine index.
///
/// The dimension is fixed by the first insert; every later insert and query
/// must match it. Inserting an existing id replaces that entry.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    entries: Vec<VectorEntry>,
    norms: Vec<f32>,
    positions: HashMap<ChunkId, usize>,
}

impl VectorIndex {
    pub fn new() -> Self { Self::default() }

    pub fn dimension(&self) -> Option<usize> { self.dimension }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn entries(&self) -> &[VectorEntry] { &self.entries }

    pub fn get(&self, id: ChunkId) -> Option<&VectorEntry> {
        self.positions.get(&id).map(|&pos| &self.entries[pos])
    }

    pub fn insert(&mut self, id: ChunkId, embedding: Vec<f32>, metadata: EntryMetadata) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::Embedding(format!("chunk {id}: cannot index an empty embedding")));
        }
        match self.dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(Error::DimensionMismatch { expected, actual: embedding.len() });
            }
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }
        let norm = l2_norm(&embedding);
        let entry = VectorEntry { id, embedding, metadata };
        match self.positions.get(&id) {
            Some(&pos) => {
                self.entries[pos] = entry;
                self.norms[pos] = norm;
            }
            None => {
                self.positions.insert(id, self.entries.len());
                self.entries.push(entry);
                self.norms.push(norm);
            }
        }
        Ok(())
    }

    /// The `k` entries most cosine-similar to `vector`, most similar first,
    /// ties broken by ascending id.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorResult>> {
        let Some(expected) = self.dimension else { return Ok(Vec::new()) };
        if vector.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: vector.len() });
        }
        if k == 0 { return Ok(Vec::new()); }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(pos, (entry, &norm))| (pos, cosine_with_norms(vector, query_norm, &entry.embedding, norm)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| self.entries[a.0].id.cmp(&self.entries[b.0].id)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, similarity)| {
                let entry = &self.entries[pos];
                VectorResult {
                    id: entry.id,
                    similarity,
                    title: entry.metadata.title.clone(),
                    text: entry.metadata.text.clone(),
                }
            })
            .collect())
    }
}

/// Cosine similarity; `0.0` when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 { cosine_with_norms(a, l2_norm(a), b, l2_norm(b)) }

fn cosine_with_norms(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 { return 0.0; }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn l2_norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }
