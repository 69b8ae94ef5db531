//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_EMBEDDING__MODEL`). The resulting [`Settings`] value is passed
//! explicitly to the indexes, the ranker and the retriever.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 50;
pub const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FUZZINESS: f32 = 0.1;
pub const DEFAULT_FUZZY_WEIGHT: f32 = 0.45;
pub const DEFAULT_PREFIX_WEIGHT: f32 = 0.375;
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 1.0;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 2.0;
pub const DEFAULT_RRF_K: f64 = 10.0;
pub const DEFAULT_SEMANTIC_CANDIDATES: usize = 10;
pub const DEFAULT_CONTEXT_PASSAGES: usize = 5;
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:1.5b";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingOptions,
    pub embedding: EmbeddingOptions,
    pub keyword: KeywordOptions,
    pub fusion: FusionOptions,
    pub search: SearchOptions,
    pub chat: ChatOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { corpus_dir: "../dev_data/corpus".to_string(), index_dir: "../dev_data/indexes".to_string() }
    }
}

/// Fixed-size chunking with overlap, measured in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, chunk_overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Ollama HTTP API.
    Ollama,
    /// BGE-M3 weights loaded from `model_dir` and run with candle.
    Local,
    /// Deterministic hashed bag-of-words vectors; offline and test use.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOptions {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub endpoint: String,
    pub model_dir: Option<String>,
    pub hash_dim: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model_dir: None,
            hash_dim: 384,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
        }
    }
}

/// Keyword matching knobs.
///
/// `fuzziness` is the tolerated edit distance as a fraction of the term
/// length. Fuzzy and prefix matches score a constant `*_weight` per field,
/// below any exact match of the same term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordOptions {
    pub fuzziness: f32,
    pub prefix: bool,
    pub fuzzy_weight: f32,
    pub prefix_weight: f32,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self { fuzziness: DEFAULT_FUZZINESS, prefix: true, fuzzy_weight: DEFAULT_FUZZY_WEIGHT, prefix_weight: DEFAULT_PREFIX_WEIGHT }
    }
}

/// Weights and damping constant of the fusion rule
/// `1 - (Wk / (K + keyword) + Ws / (K + semantic))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionOptions {
    pub keyword_weight: f64,
    pub semantic_weight: f64,
    pub rrf_k: f64,
}

impl Default for FusionOptions {
    fn default() -> Self {
        Self { keyword_weight: DEFAULT_KEYWORD_WEIGHT, semantic_weight: DEFAULT_SEMANTIC_WEIGHT, rrf_k: DEFAULT_RRF_K }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Vector candidates fetched for fusion and for unlimited semantic search.
    pub semantic_candidates: usize,
    pub default_limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { semantic_candidates: DEFAULT_SEMANTIC_CANDIDATES, default_limit: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    pub model: String,
    pub endpoint: String,
    pub context_passages: usize,
    pub timeout_secs: u64,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            context_passages: DEFAULT_CONTEXT_PASSAGES,
            timeout_secs: 120,
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a single TOML file; environment is not consulted.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let s = self.settings()?;
        if s.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be positive");
        }
        if s.chunking.chunk_overlap >= s.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap ({}) must be smaller than chunk_size ({})", s.chunking.chunk_overlap, s.chunking.chunk_size);
        }
        if s.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be positive");
        }
        if !(0.0..1.0).contains(&s.keyword.fuzziness) {
            anyhow::bail!("keyword.fuzziness must be within [0, 1), got {}", s.keyword.fuzziness);
        }
        if s.fusion.rrf_k <= 0.0 {
            anyhow::bail!("fusion.rrf_k must be positive");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
