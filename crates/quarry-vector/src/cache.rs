//! In-process embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling a provider and written through on misses, so
//! rebuilding over unchanged chunks does not re-embed them.
use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<(String, String), Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, text: &str, embedder_id: &str) -> Option<Vec<f32>> {
        self.entries.lock().get(&(content_hash(text), embedder_id.to_string())).cloned()
    }

    pub fn put(&self, text: &str, embedder_id: &str, vector: Vec<f32>) {
        self.entries.lock().insert((content_hash(text), embedder_id.to_string()), vector);
    }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }

    pub fn clear(&self) { self.entries.lock().clear(); }
}

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }
