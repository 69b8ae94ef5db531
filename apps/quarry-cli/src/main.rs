mod chat;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use quarry_core::config::{expand_path, Config, FusionOptions, Settings};
use quarry_core::data_processor::DataProcessor;
use quarry_core::traits::Embedder;
use quarry_core::types::Score;
use quarry_embed::{get_default_embedder, UnavailableEmbedder};
use quarry_hybrid::{answer, is_exit_command, ChatProvider, Conversation, Retriever};

use crate::chat::OllamaChat;

#[derive(Parser)]
#[command(name = "quarry", about = "Hybrid keyword + semantic retrieval over a local corpus")]
struct Cli {
    /// Config file (defaults to config.toml, config.<RUST_ENV>.toml and APP_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the saved indexes
    #[arg(long, global = true)]
    index_dir: Option<String>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and index every .txt/.md file under a directory
    Index {
        dir: Option<String>,
        /// Only index the first N documents
        #[arg(long)]
        limit_docs: Option<usize>,
    },
    /// Fused keyword + semantic search
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        keyword_weight: Option<f64>,
        #[arg(long)]
        semantic_weight: Option<f64>,
        #[arg(long)]
        rrf_k: Option<f64>,
    },
    /// Keyword search only; does not need the embedding provider
    Keyword {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Semantic search only
    Semantic {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Answer one question from the indexed passages
    Ask { question: String },
    /// Interactive question answering
    Chat,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let index_dir = expand_path(cli.index_dir.as_deref().unwrap_or(&settings.data.index_dir));

    let rt = Runtime::new()?;
    let embedder: Arc<dyn Embedder> = match get_default_embedder(&settings.embedding) {
        Ok(embedder) => embedder,
        // keyword search only reads the keyword index
        Err(e) if matches!(cli.command, Command::Keyword { .. }) => {
            warn!("Embedding provider unavailable, continuing with keyword search only: {e}");
            Arc::new(UnavailableEmbedder::new(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let retriever = Retriever::new(embedder, settings.clone()).with_progress(true);

    match cli.command {
        Command::Index { dir, limit_docs } => {
            let data_dir = expand_path(dir.as_deref().unwrap_or(&settings.data.corpus_dir));
            run_index(&rt, &retriever, &settings, &data_dir, limit_docs, &index_dir)?;
        }
        Command::Search { query, limit, keyword_weight, semantic_weight, rrf_k } => {
            load(&rt, &retriever, &index_dir)?;
            let defaults = settings.fusion;
            let options = FusionOptions {
                keyword_weight: keyword_weight.unwrap_or(defaults.keyword_weight),
                semantic_weight: semantic_weight.unwrap_or(defaults.semantic_weight),
                rrf_k: rrf_k.unwrap_or(defaults.rrf_k),
            };
            let results = rt.block_on(retriever.search_with(&query, limit, &options))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("🔀 {} results for \"{}\"", results.len(), query);
                for r in &results {
                    println!(
                        "{:>8.4}  #{:<6} kw={:<8.4} sem={:<7.4} [{}] {}",
                        r.rank,
                        r.id,
                        r.keyword_score,
                        r.semantic_score,
                        r.title,
                        preview(&r.text)
                    );
                }
            }
        }
        Command::Keyword { query, limit } => {
            load(&rt, &retriever, &index_dir)?;
            let results = retriever.keyword_search(&query, limit)?;
            print_scores("🔤", &query, &results, cli.json)?;
        }
        Command::Semantic { query, limit } => {
            load(&rt, &retriever, &index_dir)?;
            let results = rt.block_on(retriever.semantic_search(&query, limit))?;
            print_scores("🧭", &query, &results, cli.json)?;
        }
        Command::Ask { question } => {
            load(&rt, &retriever, &index_dir)?;
            let chat: Arc<dyn ChatProvider> = Arc::new(OllamaChat::new(&settings.chat)?);
            let mut conversation = Conversation::new();
            let reply = rt.block_on(answer(&retriever, chat, &question, &mut conversation))?;
            println!("{}", reply.text);
        }
        Command::Chat => {
            load(&rt, &retriever, &index_dir)?;
            let chat: Arc<dyn ChatProvider> = Arc::new(OllamaChat::new(&settings.chat)?);
            run_chat(&rt, &retriever, chat)?;
        }
    }
    Ok(())
}

fn run_index(
    rt: &Runtime,
    retriever: &Retriever,
    settings: &Settings,
    data_dir: &Path,
    limit_docs: Option<usize>,
    index_dir: &Path,
) -> anyhow::Result<()> {
    println!("📂 Indexing {}", data_dir.display());
    let processor = DataProcessor::new(settings.chunking.clone());
    let store = match limit_docs {
        Some(n) => processor.build_store(&processor.load_corpus_limited(data_dir, n)?),
        None => processor.process_directory(data_dir)?,
    };
    println!("🧩 {} chunks from {} documents", store.len(), store.document_count());
    let report = rt.block_on(retriever.build_indexes(&store))?;
    for s in &report.skipped { println!("⚠️  skipped #{} [{}]: {}", s.id, s.title, s.reason); }
    rt.block_on(retriever.save(index_dir))?;
    println!(
        "✅ Indexed {} chunks ({} embedded, {} cached, {} skipped) → {}",
        report.chunks,
        report.embedded,
        report.cached,
        report.skipped.len(),
        index_dir.display()
    );
    Ok(())
}

fn run_chat(rt: &Runtime, retriever: &Retriever, chat: Arc<dyn ChatProvider>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut conversation = Conversation::new();
    let mut greeting = "🤖 Hello, what would you like to know?";
    loop {
        print!("{greeting}\n❓ ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        let question = line.trim();
        if question.is_empty() { continue; }
        if is_exit_command(question) { break; }
        match rt.block_on(answer(retriever, Arc::clone(&chat), question, &mut conversation)) {
            Ok(reply) => println!("{}", reply.text),
            Err(e) => eprintln!("❌ {e}"),
        }
        greeting = "🤖 What else would you like to know?";
    }
    println!("👋 Bye!");
    Ok(())
}

fn load(rt: &Runtime, retriever: &Retriever, index_dir: &Path) -> anyhow::Result<()> {
    rt.block_on(retriever.load(index_dir)).map_err(|e| {
        eprintln!("Could not load indexes from {} (run `quarry index` first)", index_dir.display());
        e.into()
    })
}

fn print_scores(icon: &str, query: &str, results: &[Score], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    println!("{icon} {} results for \"{}\"", results.len(), query);
    for s in results { println!("{:>8.4}  #{:<6} [{}] {}", s.rank, s.id, s.title, preview(&s.text)); }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= 100 { flat } else { format!("{}…", flat.chars().take(100).collect::<String>()) }
}
