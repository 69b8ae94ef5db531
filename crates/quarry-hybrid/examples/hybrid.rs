//! Offline walk-through: index a handful of chunks with the hashing embedder
//! and compare keyword, semantic and fused results.
//!
//! `cargo run -p quarry-hybrid --example hybrid -- "boil water"`
use std::sync::Arc;

use quarry_core::chunk_store::ChunkStore;
use quarry_core::config::Settings;
use quarry_embed::HashEmbedder;
use quarry_hybrid::Retriever;

#[tokio::main]
async fn main() -> quarry_core::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let query = std::env::args().nth(1).unwrap_or_else(|| "boil water".to_string());

    let mut store = ChunkStore::new();
    store.push_document("fire", ["Build a small fire with dry kindling.", "Feed the fire with larger logs once it catches."]);
    store.push_document("water", ["Boil water for one minute before drinking.", "Filter cloudy water through cloth first."]);
    store.push_document("knots", ["The bowline knot forms a fixed loop."]);

    let retriever = Retriever::new(Arc::new(HashEmbedder::new(128)), Settings::default());
    let report = retriever.build_indexes(&store).await?;
    println!("📦 Indexed {} chunks ({} skipped)", report.chunks, report.skipped.len());

    println!("\n🔤 keyword: {query}");
    for s in retriever.keyword_search(&query, Some(5))? { println!("  {:>8.4}  #{} [{}] {}", s.rank, s.id, s.title, s.text); }
    println!("\n🧭 semantic: {query}");
    for s in retriever.semantic_search(&query, Some(5)).await? { println!("  {:>8.4}  #{} [{}] {}", s.rank, s.id, s.title, s.text); }
    println!("\n🔀 fused: {query}");
    for r in retriever.search(&query, Some(5)).await? {
        println!("  {:>8.4}  #{} kw={:.4} sem={:.4} [{}] {}", r.rank, r.id, r.keyword_score, r.semantic_score, r.title, r.text);
    }
    Ok(())
}
