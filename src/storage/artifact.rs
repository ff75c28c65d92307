//! Artifact file format and I/O
//!
//! The extension picks the format: `.msgpack` is MessagePack, `.parquet` is
//! Parquet (partitions and neighbor tables only), everything else pretty JSON.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{MSGPACK_EXT, PARQUET_EXT};
use crate::core::{FinalCluster, NeighborEdge, NeighborRecord, RuleEdge, SimilarityPartition};
use crate::error::{PipelineError, Result};

use super::parquet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
	Json,
	MessagePack,
	Parquet,
}

impl Format {
	fn of(path: &Path) -> Self {
		match path.extension().and_then(|ext| ext.to_str()) {
			Some(ext) if ext.eq_ignore_ascii_case(MSGPACK_EXT) => Self::MessagePack,
			Some(ext) if ext.eq_ignore_ascii_case(PARQUET_EXT) => Self::Parquet,
			_ => Self::Json,
		}
	}
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
			path: parent.to_path_buf(),
			source,
		})?;
	}
	Ok(())
}

pub(crate) fn codec(path: &Path, err: impl std::fmt::Display) -> PipelineError {
	PipelineError::Codec {
		path: path.to_path_buf(),
		reason: err.to_string(),
	}
}

fn parquet_unsupported(path: &Path) -> PipelineError {
	PipelineError::config(format!(
		"{}: Parquet holds partitions and neighbor tables only",
		path.display()
	))
}

/// Save any serializable artifact, creating parent directories
pub fn save<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
	let bytes = match Format::of(path) {
		Format::MessagePack => rmp_serde::to_vec_named(value).map_err(|e| codec(path, e))?,
		Format::Json => {
			let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| codec(path, e))?;
			bytes.push(b'\n');
			bytes
		}
		Format::Parquet => return Err(parquet_unsupported(path)),
	};

	create_parent(path)?;
	fs::write(path, bytes).map_err(|source| PipelineError::Io {
		path: path.to_path_buf(),
		source,
	})
}

/// Load an artifact written by [`save`] or by an external producer
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let format = Format::of(path);
	if format == Format::Parquet {
		return Err(parquet_unsupported(path));
	}

	let bytes = fs::read(path).map_err(|source| PipelineError::Io {
		path: path.to_path_buf(),
		source,
	})?;

	match format {
		Format::MessagePack => rmp_serde::from_slice(&bytes).map_err(|e| codec(path, e)),
		_ => serde_json::from_slice(&bytes).map_err(|e| codec(path, e)),
	}
}

/// Load one similarity partition in any supported format and layout.
/// Undecodable content is reported as malformed input.
pub fn load_partition(path: &Path) -> Result<SimilarityPartition> {
	if Format::of(path) == Format::Parquet {
		return parquet::read_partition(path);
	}

	let value: serde_json::Value = load(path).map_err(|err| match err {
		PipelineError::Codec { path, reason } => PipelineError::MalformedInput { path, reason },
		other => other,
	})?;
	SimilarityPartition::from_value(value, path)
}

pub fn save_neighbors(path: &Path, edges: &[NeighborEdge]) -> Result<()> {
	match Format::of(path) {
		Format::Parquet => parquet::write_neighbors(path, edges),
		_ => save(path, edges),
	}
}

/// Neighbor rows may carry nulls when produced outside this crate
pub fn load_neighbors(path: &Path) -> Result<Vec<NeighborRecord>> {
	match Format::of(path) {
		Format::Parquet => parquet::read_neighbors(path),
		_ => load(path),
	}
}

pub fn save_edges(path: &Path, edges: &[RuleEdge]) -> Result<()> {
	save(path, edges)
}

pub fn load_edges(path: &Path) -> Result<Vec<RuleEdge>> {
	load(path)
}

pub fn save_clusters(path: &Path, clusters: &[FinalCluster]) -> Result<()> {
	save(path, clusters)
}

pub fn load_clusters(path: &Path) -> Result<Vec<FinalCluster>> {
	load(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn edges_persist_as_bare_pairs() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("edges.json");
		let edges: Vec<RuleEdge> = vec![["a".into(), "b".into()]];

		save_edges(&path, &edges).unwrap();

		let text = fs::read_to_string(&path).unwrap();
		let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
		assert_eq!(raw, serde_json::json!([["a", "b"]]));
		assert_eq!(load_edges(&path).unwrap(), edges);
	}

	#[test]
	fn msgpack_extension_selects_messagepack() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("neighbors.msgpack");
		let edges = vec![NeighborEdge::new("a", "b", 0.5)];

		save_neighbors(&path, &edges).unwrap();

		assert!(serde_json::from_slice::<serde_json::Value>(&fs::read(&path).unwrap()).is_err());
		let records = load_neighbors(&path).unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].domain2.as_deref(), Some("b"));
	}

	#[test]
	fn missing_file_is_io_error() {
		let err = load_edges(Path::new("/nonexistent/edges.json")).unwrap_err();
		assert!(matches!(err, PipelineError::Io { .. }));
	}

	#[test]
	fn undecodable_partition_is_malformed_input() {
		let dir = tempfile::tempdir().unwrap();
		let cases = [
			("part.0.json", r#"{"domain_": ["a"], "columns": ["b"], "values": [["high"]]}"#),
			("part.1.json", r#"{"domain_": ["a"], "columns": ["b"], "#),
			("part.2.json", r#"[{"domain_": "a", "b": "high"}]"#),
		];

		for (name, text) in cases {
			let path = dir.path().join(name);
			fs::write(&path, text).unwrap();
			let err = load_partition(&path).unwrap_err();
			assert!(matches!(err, PipelineError::MalformedInput { .. }), "{name}: {err:?}");
		}
	}

	#[test]
	fn row_layout_partition_loads_from_messagepack() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("part.0.msgpack");
		let rows = serde_json::json!([
			{"domain_": "a", "b": 0.3, "c": 0.25},
			{"domain_": "b", "a": 0.3, "c": 0.5},
		]);
		save(&path, &rows).unwrap();

		let partition = load_partition(&path).unwrap();
		assert_eq!(partition.domains.as_deref().map(<[String]>::len), Some(2));
		assert_eq!(partition.columns, ["b", "c", "a"]);
		assert_eq!(partition.values[1], vec![None, Some(0.5), Some(0.3)]);
	}

	#[test]
	fn parquet_is_refused_for_edge_lists() {
		let err = save_edges(Path::new("edges.parquet"), &[]).unwrap_err();
		assert!(matches!(err, PipelineError::Configuration(_)));
		assert!(!Path::new("edges.parquet").exists());
	}
}
