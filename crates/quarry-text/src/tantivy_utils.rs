use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};
use tantivy::Index;

use quarry_core::Error;

pub const TOKENIZER_NAME: &str = "quarry_text";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

#[derive(Debug, Clone, Copy)]
pub struct Fields {
	pub id: Field,
	pub title: Field,
	pub text: Field,
}

impl Fields {
	/// Both fields a query is matched against, title first.
	pub fn searchable(&self) -> [Field; 2] { [self.title, self.text] }
}

pub fn build_schema() -> (Schema, Fields) {
	let mut schema_builder = Schema::builder();
	let id = schema_builder.add_u64_field("id", INDEXED | STORED);
	let indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(indexing).set_stored();
	let title = schema_builder.add_text_field("title", text_options.clone());
	let text = schema_builder.add_text_field("text", text_options);
	(schema_builder.build(), Fields { id, title, text })
}

pub fn analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(64))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(TOKENIZER_NAME, analyzer());
}

/// Distinct analysed terms of `text`, in first-seen order.
pub fn query_terms(text: &str) -> Vec<String> {
	let mut analyzer = analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut terms: Vec<String> = Vec::new();
	while stream.advance() {
		let token = &stream.token().text;
		if !terms.iter().any(|t| t == token) { terms.push(token.clone()); }
	}
	terms
}

pub(crate) fn index_err(err: tantivy::TantivyError) -> Error { Error::Index(err.to_string()) }
