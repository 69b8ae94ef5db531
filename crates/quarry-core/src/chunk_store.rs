use std::collections::BTreeMap;

use crate::types::{Chunk, ChunkId};

/// Ordered chunks of every ingested document.
///
/// Ids are assigned on insertion: 1-based and increasing across the whole
/// store, so documents pushed in the same order always get the same ids.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    documents: BTreeMap<String, (usize, usize)>,
}

impl ChunkStore {
    pub fn new() -> Self { Self::default() }

    /// Append the chunks of one document; returns the ids assigned to them.
    ///
    /// A title that was already pushed gets its new chunks appended to the
    /// store but its document range re-pointed to the latest batch.
    pub fn push_document<I, S>(&mut self, title: &str, pieces: I) -> Vec<ChunkId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = self.chunks.len();
        let mut ids = Vec::new();
        for piece in pieces {
            let id = self.chunks.len() as ChunkId + 1;
            self.chunks.push(Chunk { id, title: title.to_string(), text: piece.into() });
            ids.push(id);
        }
        self.documents.insert(title.to_string(), (start, self.chunks.len()));
        ids
    }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.chunks.get(idx)
    }

    /// Chunks of a single document, in order.
    pub fn document(&self, title: &str) -> Option<&[Chunk]> {
        self.documents.get(title).map(|&(start, end)| &self.chunks[start..end])
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> { self.documents.keys().map(String::as_str) }

    pub fn document_count(&self) -> usize { self.documents.len() }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}
