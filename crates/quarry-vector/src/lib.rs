//! quarry-vector
//!
//! Flat cosine vector index, concurrent embedding build with an in-process
//! cache, and LanceDB-backed persistence.

pub mod build;
pub mod cache;
pub mod index;
pub mod schema;
pub mod store;

pub use build::{build_vector_index, embed_with_timeout, BuildOptions, BuildReport, SkippedChunk};
pub use cache::{content_hash, EmbeddingCache};
pub use index::{cosine, EntryMetadata, VectorEntry, VectorIndex};
pub use store::{load_index, save_index, Manifest};
