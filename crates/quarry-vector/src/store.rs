//! On-disk layout of a saved vector index:
//!
//! - `manifest.json`: format version, dimension, entry count, embedder id
//! - `lance/`: a LanceDB dataset holding one row per entry (absent when empty)
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::connect;
use lancedb::query::{ExecutableQuery, QueryBase};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quarry_core::{Error, Result};

use crate::index::{EntryMetadata, VectorIndex};
use crate::schema::{build_arrow_schema, TABLE_NAME};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const LANCE_DIR: &str = "lance";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
	pub format_version: u32,
	pub dimension: Option<usize>,
	pub count: usize,
	pub embedder_id: String,
	pub saved_at: String,
}

/// Replace whatever is in `dir` with a snapshot of `index`.
///
/// The snapshot is written to a staging sibling first and swapped in only
/// once complete, so a failed save leaves the previous snapshot readable.
pub async fn save_index(index: &VectorIndex, embedder_id: &str, dir: &Path) -> Result<Manifest> {
	let staging = prepare_staging(dir)?;
	match write_index(index, embedder_id, &staging).await {
		Ok(manifest) => {
			swap_into_place(&staging, dir)?;
			info!("Saved vector index ({} entries) to {}", manifest.count, dir.display());
			Ok(manifest)
		}
		Err(e) => {
			discard_staging(&staging);
			Err(e)
		}
	}
}

/// Write the manifest and dataset into `dir`, which must not hold a previous snapshot.
pub async fn write_index(index: &VectorIndex, embedder_id: &str, dir: &Path) -> Result<Manifest> {
	std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

	if let Some(dim) = index.dimension().filter(|_| !index.is_empty()) {
		let uri = dir.join(LANCE_DIR).to_string_lossy().to_string();
		let db = connect(&uri).execute().await.map_err(Error::persistence)?;
		let batch = to_record_batch(index, dim)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		db.create_table(TABLE_NAME, reader).execute().await.map_err(Error::persistence)?;
	}

	let manifest = Manifest {
		format_version: FORMAT_VERSION,
		dimension: index.dimension(),
		count: index.len(),
		embedder_id: embedder_id.to_string(),
		saved_at: Utc::now().to_rfc3339(),
	};
	let path = dir.join(MANIFEST_FILE);
	let json = serde_json::to_vec_pretty(&manifest).map_err(Error::persistence)?;
	std::fs::write(&path, json).map_err(|e| io_err(&path, e))?;
	Ok(manifest)
}

/// `.name.staging` next to `dir`.
pub fn staging_path(dir: &Path) -> Result<PathBuf> { sibling(dir, "staging") }

/// An empty staging directory for `dir`; leftovers of an interrupted save are removed.
pub fn prepare_staging(dir: &Path) -> Result<PathBuf> {
	let staging = staging_path(dir)?;
	if staging.exists() { std::fs::remove_dir_all(&staging).map_err(|e| io_err(&staging, e))?; }
	std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
	Ok(staging)
}

pub fn discard_staging(staging: &Path) {
	if let Err(e) = std::fs::remove_dir_all(staging) {
		warn!("Could not remove {}: {}", staging.display(), e);
	}
}

/// Move a complete `staging` directory to `target`, replacing what was there.
///
/// The previous `target` is parked as `.name.old` and restored if the final
/// rename fails.
pub fn swap_into_place(staging: &Path, target: &Path) -> Result<()> {
	let backup = sibling(target, "old")?;
	if backup.exists() { std::fs::remove_dir_all(&backup).map_err(|e| io_err(&backup, e))?; }
	let had_previous = target.exists();
	if had_previous { std::fs::rename(target, &backup).map_err(|e| io_err(target, e))?; }
	if let Err(e) = std::fs::rename(staging, target) {
		if had_previous {
			if let Err(restore) = std::fs::rename(&backup, target) {
				warn!("Could not restore {} from {}: {}", target.display(), backup.display(), restore);
			}
		}
		return Err(io_err(target, e));
	}
	if had_previous { discard_staging(&backup); }
	Ok(())
}

fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
	let name = dir
		.file_name()
		.ok_or_else(|| Error::Persistence(format!("{} does not name a directory", dir.display())))?;
	let mut sibling = OsString::from(".");
	sibling.push(name);
	sibling.push(".");
	sibling.push(suffix);
	Ok(dir.with_file_name(sibling))
}

pub async fn load_index(dir: &Path) -> Result<(VectorIndex, Manifest)> {
	let manifest = read_manifest(dir)?;
	let mut index = VectorIndex::new();
	if manifest.count == 0 { return Ok((index, manifest)); }

	let uri = dir.join(LANCE_DIR).to_string_lossy().to_string();
	let db = connect(&uri).execute().await.map_err(Error::persistence)?;
	let table = db.open_table(TABLE_NAME).execute().await.map_err(Error::persistence)?;
	let mut stream = table.query().limit(manifest.count).execute().await.map_err(Error::persistence)?;
	while let Some(batch) = TryStreamExt::try_next(&mut stream).await.map_err(Error::persistence)? {
		let ids = column::<UInt64Array>(&batch, "id")?;
		let titles = column::<StringArray>(&batch, "title")?;
		let texts = column::<StringArray>(&batch, "text")?;
		let vectors = column::<FixedSizeListArray>(&batch, "vector")?;
		for i in 0..batch.num_rows() {
			let embedding = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
			let metadata = EntryMetadata { title: titles.value(i).to_string(), text: texts.value(i).to_string() };
			index.insert(ids.value(i), embedding, metadata)?;
		}
	}
	if index.len() != manifest.count || index.dimension() != manifest.dimension {
		return Err(Error::Persistence(format!(
			"{} holds {} entries of dimension {:?}, manifest expects {} of {:?}",
			dir.display(),
			index.len(),
			index.dimension(),
			manifest.count,
			manifest.dimension
		)));
	}
	info!("Loaded vector index ({} entries, embedder {})", index.len(), manifest.embedder_id);
	Ok((index, manifest))
}

pub fn read_manifest(dir: &Path) -> Result<Manifest> {
	let path = dir.join(MANIFEST_FILE);
	let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
	let manifest: Manifest = serde_json::from_slice(&bytes).map_err(Error::persistence)?;
	if manifest.format_version != FORMAT_VERSION {
		return Err(Error::Persistence(format!("unsupported vector index format {}", manifest.format_version)));
	}
	Ok(manifest)
}

fn to_record_batch(index: &VectorIndex, dim: usize) -> Result<RecordBatch> {
	let dim = i32::try_from(dim).map_err(|_| Error::Persistence(format!("dimension {dim} does not fit the Arrow schema")))?;
	let mut ids = Vec::with_capacity(index.len());
	let mut titles = Vec::with_capacity(index.len());
	let mut texts = Vec::with_capacity(index.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(index.len());
	for entry in index.entries() {
		ids.push(entry.id);
		titles.push(entry.metadata.title.clone());
		texts.push(entry.metadata.text.clone());
		vectors.push(Some(entry.embedding.iter().map(|&x| Some(x)).collect()));
	}
	RecordBatch::try_new(
		build_arrow_schema(dim),
		vec![
			Arc::new(UInt64Array::from(ids)),
			Arc::new(StringArray::from(titles)),
			Arc::new(StringArray::from(texts)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		],
	)
	.map_err(Error::persistence)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::Persistence(format!("column {name} missing or of unexpected type")))
}

fn io_err(path: &Path, err: std::io::Error) -> Error { Error::Persistence(format!("{}: {}", path.display(), err)) }
