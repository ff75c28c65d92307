//! Top-K neighbor extraction from similarity partitions

use std::cmp::Ordering;
use std::path::Path;

use crate::config::validate_top_k;
use crate::core::{NeighborEdge, SimilarityPartition};
use crate::error::Result;
use crate::storage;
use crate::ui;

/// Reads every partition under `folder` in sequence order and keeps, for each
/// row, its `top_k` most similar columns.
pub fn extract_top_k(folder: &Path, top_k: usize) -> Result<Vec<NeighborEdge>> {
	validate_top_k(top_k)?;

	let files = storage::list_partitions(folder)?;
	if files.is_empty() {
		ui::warn(&format!("No similarity partitions in {}", folder.display()));
	}

	let mut edges = Vec::new();
	for (index, path) in files.iter().enumerate() {
		let partition = storage::load_partition(path)?;
		let before = edges.len();
		partition_top_k(&partition, path, top_k, &mut edges)?;

		ui::debug(&format!(
			"[{}/{}] {}: {} edges",
			index + 1,
			files.len(),
			path.display(),
			edges.len() - before
		));
	}

	Ok(edges)
}

/// Appends the top-K edges of every row in `partition` to `out`.
/// `path` only labels errors.
pub fn partition_top_k(
	partition: &SimilarityPartition,
	path: &Path,
	top_k: usize,
	out: &mut Vec<NeighborEdge>,
) -> Result<()> {
	let (domains, comparable) = partition.validate(path)?;
	let mut ranked: Vec<(usize, f32)> = Vec::with_capacity(comparable.len());

	for (row, domain) in domains.iter().enumerate() {
		let values = &partition.values[row];

		ranked.clear();
		ranked.extend(
			comparable
				.iter()
				.filter(|&&col| partition.columns[col] != *domain)
				.filter_map(|&col| values[col].filter(|v| !v.is_nan()).map(|v| (col, v))),
		);

		// Stable: equal scores keep their column order
		ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

		out.extend(
			ranked
				.iter()
				.take(top_k)
				.map(|&(col, sim)| NeighborEdge::new(domain.clone(), partition.columns[col].clone(), sim)),
		);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::PipelineError;

	fn partition(domains: &[&str], columns: &[&str], values: Vec<Vec<Option<f32>>>) -> SimilarityPartition {
		SimilarityPartition {
			domains: Some(domains.iter().map(|d| d.to_string()).collect()),
			columns: columns.iter().map(|c| c.to_string()).collect(),
			values,
		}
	}

	fn run(p: &SimilarityPartition, k: usize) -> Vec<NeighborEdge> {
		let mut out = Vec::new();
		partition_top_k(p, Path::new("p.json"), k, &mut out).unwrap();
		out
	}

	#[test]
	fn k_equal_to_neighbor_count_keeps_everything() {
		let p = partition(
			&["A"],
			&["A", "B", "C"],
			vec![vec![Some(1.0), Some(0.9), Some(0.1)]],
		);

		assert_eq!(
			run(&p, 2),
			vec![NeighborEdge::new("A", "B", 0.9), NeighborEdge::new("A", "C", 0.1)]
		);
	}

	#[test]
	fn self_column_is_excluded_by_label_not_position() {
		// Second partition: row "C" sits at position 0 but its column is last
		let p = partition(
			&["C"],
			&["A", "B", "C"],
			vec![vec![Some(0.2), Some(0.3), Some(1.0)]],
		);

		let edges = run(&p, 1);
		assert_eq!(edges, vec![NeighborEdge::new("C", "B", 0.3)]);
	}

	#[test]
	fn ties_keep_column_order() {
		let p = partition(
			&["A"],
			&["A", "D", "B", "C"],
			vec![vec![Some(1.0), Some(0.5), Some(0.5), Some(0.5)]],
		);

		let picked: Vec<String> = run(&p, 2).into_iter().map(|e| e.domain2).collect();
		assert_eq!(picked, vec!["D", "B"]);
	}

	#[test]
	fn nulls_and_bookkeeping_columns_are_skipped() {
		let p = partition(
			&["A"],
			&["__null_dask_index__", "A", "B", "C"],
			vec![vec![Some(99.0), Some(1.0), None, Some(f32::NAN)]],
		);

		assert!(run(&p, 3).is_empty());
	}

	#[test]
	fn missing_index_column_is_malformed() {
		let p = SimilarityPartition {
			domains: None,
			columns: vec!["A".into()],
			values: vec![],
		};
		let mut out = Vec::new();
		let err = partition_top_k(&p, Path::new("p.json"), 1, &mut out).unwrap_err();
		assert!(matches!(err, PipelineError::MalformedInput { .. }));
	}

	#[test]
	fn zero_top_k_is_rejected() {
		let err = extract_top_k(Path::new("/nonexistent"), 0).unwrap_err();
		assert!(matches!(err, PipelineError::Configuration(_)));
	}

	#[test]
	fn missing_folder_yields_no_edges() {
		assert!(extract_top_k(Path::new("/nonexistent"), 3).unwrap().is_empty());
	}

	#[test]
	fn domain_repeated_across_partitions_is_not_deduplicated() {
		let dir = tempfile::tempdir().unwrap();
		let p = partition(
			&["A"],
			&["A", "B", "C"],
			vec![vec![Some(1.0), Some(0.9), Some(0.4)]],
		);
		storage::artifact::save(&dir.path().join("part.0.json"), &p).unwrap();
		storage::artifact::save(&dir.path().join("part.1.msgpack"), &p).unwrap();

		let edges = extract_top_k(dir.path(), 2).unwrap();
		assert_eq!(edges.len(), 4);
		assert_eq!(edges[..2], edges[2..]);
		assert!(edges.iter().all(|e| e.domain1 == "A"));
	}
}
