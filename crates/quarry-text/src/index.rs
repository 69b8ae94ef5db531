use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use quarry_core::config::KeywordOptions;
use quarry_core::types::{Chunk, KeywordResult};
use quarry_core::{Error, Result};

use crate::tantivy_utils::{build_schema, index_err, query_terms, register_tokenizer, Fields};

const WRITER_HEAP_BYTES: usize = 50_000_000;
/// Largest distance tantivy's Levenshtein automata support.
const MAX_EDIT_DISTANCE: u8 = 2;
const SNAPSHOT_VERSION: u32 = 1;
/// Lowest per-term quality of an exact hit; fuzzy and prefix hits stay below it.
const EXACT_FLOOR: f32 = 0.5;

/// In-memory inverted index over chunk titles and texts.
///
/// Built once from a chunk slice and never mutated afterwards; rebuilding
/// produces a new value.
pub struct KeywordIndex {
	index: Index,
	reader: IndexReader,
	fields: Fields,
	options: KeywordOptions,
	entries: Vec<Chunk>,
}

#[derive(Default)]
struct TermMatches {
	matched: u32,
	quality: f32,
}

impl TermMatches {
	fn add(&mut self, quality: f32) {
		self.matched += 1;
		self.quality += quality;
	}
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	version: u32,
	options: &'a KeywordOptions,
	entries: &'a [Chunk],
}

#[derive(Deserialize)]
struct Snapshot {
	version: u32,
	options: KeywordOptions,
	entries: Vec<Chunk>,
}

impl KeywordIndex {
	pub fn build(chunks: &[Chunk], options: &KeywordOptions) -> Result<Self> {
		info!("Building keyword index over {} chunks", chunks.len());
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index);
		// one indexing thread keeps the segment layout, and so the scores, reproducible
		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(index_err)?;
		for c in chunks {
			writer
				.add_document(doc!(
					fields.id => c.id,
					fields.title => c.title.as_str(),
					fields.text => c.text.as_str()
				))
				.map_err(index_err)?;
		}
		writer.commit().map_err(index_err)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		info!("Keyword index ready ({} documents)", reader.searcher().num_docs());
		Ok(Self { index, reader, fields, options: options.clone(), entries: chunks.to_vec() })
	}

	/// All chunks matching at least one query term, best first.
	///
	/// Each matched query term adds `1`, so a chunk matching more distinct
	/// terms always ranks above one matching fewer. The fractional part ranks
	/// chunks matching the same number of terms: per term, an exact hit
	/// scores in `[0.5, 1)` from its saturated BM25 and a fuzzy or prefix
	/// hit scores in `[0, 0.5)`, averaged over the query terms.
	///
	/// A query without indexable terms (empty, punctuation, only stop words)
	/// returns an empty list.
	pub fn search(&self, query: &str) -> Result<Vec<KeywordResult>> {
		let terms = query_terms(query);
		if terms.is_empty() { return Ok(Vec::new()); }
		let searcher = self.reader.searcher();
		let num_docs = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
		if num_docs == 0 { return Ok(Vec::new()); }

		let collector = TopDocs::with_limit(num_docs);
		let mut matches: BTreeMap<DocAddress, TermMatches> = BTreeMap::new();
		for text in &terms {
			let mut exact_docs: BTreeSet<DocAddress> = BTreeSet::new();
			for (bm25, addr) in searcher.search(&self.exact_query(text), &collector).map_err(index_err)? {
				exact_docs.insert(addr);
				matches.entry(addr).or_default().add(EXACT_FLOOR + EXACT_FLOOR * saturate(bm25));
			}
			if let Some(approx) = self.approximate_query(text) {
				for (weight, addr) in searcher.search(&approx, &collector).map_err(index_err)? {
					if exact_docs.contains(&addr) { continue; }
					matches.entry(addr).or_default().add(EXACT_FLOOR * saturate(weight));
				}
			}
		}

		let term_count = terms.len() as f32;
		let mut hits = Vec::with_capacity(matches.len());
		for (addr, m) in matches {
			let doc: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			let id = doc
				.get_first(self.fields.id)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Index("stored document without id".to_string()))?;
			let title = doc.get_first(self.fields.title).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let text = doc.get_first(self.fields.text).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let score = m.matched as f32 + m.quality / term_count;
			hits.push(KeywordResult { id, score, title, text });
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
		debug!("keyword query {:?} ({} terms) -> {} hits", terms.join(" "), terms.len(), hits.len());
		Ok(hits)
	}

	/// BM25 over both fields for one term.
	fn exact_query(&self, text: &str) -> BooleanQuery {
		let clauses: Vec<(Occur, Box<dyn Query>)> = self
			.fields
			.searchable()
			.into_iter()
			.map(|field| {
				let term = Term::from_field_text(field, text);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		BooleanQuery::new(clauses)
	}

	/// Fuzzy and prefix clauses for one term, each scoring its constant weight
	/// per matching field. `None` when the term is too short for fuzzy
	/// matching and prefix matching is off.
	fn approximate_query(&self, text: &str) -> Option<BooleanQuery> {
		let distance = edit_distance(text, self.options.fuzziness);
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		for field in self.fields.searchable() {
			let term = Term::from_field_text(field, text);
			if distance > 0 {
				let fuzzy = FuzzyTermQuery::new(term.clone(), distance, true);
				clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(fuzzy), self.options.fuzzy_weight))));
			}
			if self.options.prefix {
				let prefix = FuzzyTermQuery::new_prefix(term, 0, true);
				clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(prefix), self.options.prefix_weight))));
			}
		}
		if clauses.is_empty() { None } else { Some(BooleanQuery::new(clauses)) }
	}

	/// Write a snapshot of the indexed entries and options as JSON.
	///
	/// Loading rebuilds the tantivy index from the snapshot with the same
	/// single-threaded writer, which reproduces identical scores.
	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| Error::Persistence(format!("{}: {}", parent.display(), e)))?;
		}
		let snapshot = SnapshotRef { version: SNAPSHOT_VERSION, options: &self.options, entries: &self.entries };
		let json = serde_json::to_vec(&snapshot).map_err(Error::persistence)?;
		std::fs::write(path, json).map_err(|e| Error::Persistence(format!("{}: {}", path.display(), e)))?;
		info!("Saved keyword index ({} entries) to {}", self.entries.len(), path.display());
		Ok(())
	}

	pub fn load(path: &Path) -> Result<Self> {
		let bytes = std::fs::read(path).map_err(|e| Error::Persistence(format!("{}: {}", path.display(), e)))?;
		let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(Error::persistence)?;
		if snapshot.version != SNAPSHOT_VERSION {
			return Err(Error::Persistence(format!("unsupported keyword snapshot version {}", snapshot.version)));
		}
		info!("Loading keyword index from {}", path.display());
		Self::build(&snapshot.entries, &snapshot.options)
	}

	pub fn options(&self) -> &KeywordOptions { &self.options }

	pub fn entries(&self) -> &[Chunk] { &self.entries }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	pub fn schema(&self) -> tantivy::schema::Schema { self.index.schema() }
}

/// Maps a non-negative score into `[0, 1)`.
fn saturate(score: f32) -> f32 { let s = score.max(0.0); s / (1.0 + s) }

/// `round(len * fuzziness)` characters, capped at what tantivy supports.
pub fn edit_distance(term: &str, fuzziness: f32) -> u8 {
	let distance = (term.chars().count() as f32 * fuzziness).round();
	if distance <= 0.0 { 0 } else { (distance as u8).min(MAX_EDIT_DISTANCE) }
}
