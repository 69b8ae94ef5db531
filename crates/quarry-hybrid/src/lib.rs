//! quarry-hybrid
//!
//! Fusion of keyword and semantic results, the `Retriever` that owns both
//! indexes, and retrieval-augmented answering on top of it.

pub mod answer;
pub mod fusion;
pub mod retriever;

pub use answer::{answer, build_prompt, is_exit_command, Answer, ChatMessage, ChatProvider, Conversation, Role};
pub use fusion::{contribution, fuse, rank};
pub use retriever::{IndexSet, Retriever};
