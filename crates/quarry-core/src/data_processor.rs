use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::chunk_store::ChunkStore;
use crate::config::ChunkingOptions;
use crate::error::{Error, Result};

/// Full document text keyed by title. Ordered, so chunk ids are stable.
pub type Corpus = BTreeMap<String, String>;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Default)]
pub struct DataProcessor {
    chunking: ChunkingOptions,
}

impl DataProcessor {
    pub fn new(chunking: ChunkingOptions) -> Self { Self { chunking } }

    /// Read every `.txt`/`.md` file under `data_dir` and chunk it into a store.
    pub fn process_directory(&self, data_dir: &Path) -> Result<ChunkStore> {
        let corpus = self.load_corpus(data_dir)?;
        Ok(self.build_store(&corpus))
    }

    pub fn load_corpus(&self, data_dir: &Path) -> Result<Corpus> {
        self.load_corpus_limited(data_dir, usize::MAX)
    }

    pub fn load_corpus_limited(&self, data_dir: &Path, limit: usize) -> Result<Corpus> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("corpus directory {}", data_dir.display())));
        }
        let mut files = self.list_documents(data_dir);
        if files.is_empty() {
            info!("No .txt or .md files found under {}", data_dir.display());
            return Ok(Corpus::new());
        }
        if files.len() > limit {
            files.truncate(limit);
            info!("Limited corpus to the first {} files", limit);
        }
        let mut corpus = Corpus::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let content = read_document(file_path)?;
            corpus.insert(title_for(file_path, data_dir), content);
        }
        info!("Loaded {} documents from {}", corpus.len(), data_dir.display());
        Ok(corpus)
    }

    /// Chunk every document of the corpus, in title order.
    pub fn build_store(&self, corpus: &Corpus) -> ChunkStore {
        let mut store = ChunkStore::new();
        for (title, text) in corpus {
            let pieces = self.chunk_text(text);
            debug!("{} -> {} chunks", title, pieces.len());
            store.push_document(title, pieces);
        }
        info!("Chunked {} documents into {} chunks", store.document_count(), store.len());
        store
    }

    /// Pack paragraphs into chunks of at most `chunk_size` characters.
    ///
    /// Paragraphs longer than a chunk are split into word windows, each
    /// starting with up to `chunk_overlap` characters of the previous one.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let size = self.chunking.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let para_len = paragraph.chars().count();
            if para_len > size {
                if !current.is_empty() { chunks.push(std::mem::take(&mut current)); current_len = 0; }
                chunks.extend(self.split_paragraph_with_overlap(paragraph, size));
                continue;
            }
            if current_len > 0 && current_len + 2 + para_len > size {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() { current.push_str("\n\n"); current_len += 2; }
            current.push_str(paragraph);
            current_len += para_len;
        }
        if !current.is_empty() { chunks.push(current); }
        chunks
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str, size: usize) -> Vec<String> {
        let overlap = self.chunking.chunk_overlap;
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = start;
            let mut len = 0usize;
            while end < words.len() {
                let add = words[end].chars().count() + usize::from(end > start);
                if end > start && len + add > size { break; }
                len += add;
                end += 1;
            }
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            let mut next = end;
            let mut carried = 0usize;
            while next > start + 1 {
                let add = words[next - 1].chars().count() + 1;
                if carried + add > overlap { break; }
                carried += add;
                next -= 1;
            }
            start = next;
        }
        chunks
    }

    fn list_documents(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if is_supported(path) { files.push(path.to_path_buf()); } else { debug!("Skipping unsupported file {}", path.display()); }
        }
        files.sort();
        files
    }
}

/// Read a single `.txt` or `.md` document; anything else is `UnsupportedInput`.
pub fn read_document(path: &Path) -> Result<String> {
    if !is_supported(path) {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        return Err(Error::UnsupportedInput(format!("{} ({}) - only txt and md files are supported", path.display(), ext)));
    }
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(path).map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()).is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Relative path without extension, `/`-separated: `a.txt` -> `a`, `x/b.md` -> `x/b`.
fn title_for(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path).with_extension("");
    relative.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect::<Vec<_>>().join("/")
}
