//! quarry-text
//!
//! Tantivy-backed keyword index over chunk titles and texts, with fuzzy and
//! prefix matching layered on BM25.

pub mod tantivy_utils;
pub mod index;

pub use index::{edit_distance, KeywordIndex};
