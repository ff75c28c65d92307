//! Topk command - reduce similarity partitions to top-K neighbor edges

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::processing::extract_top_k;
use crate::storage;
use crate::ui;

pub fn run(input: &Path, output: &Path, top_k: usize) -> Result<()> {
	let start = Instant::now();

	ui::header("Top-K neighbors");
	ui::info(&format!("Extracting top-{} neighbors from {}", top_k, input.display()));

	let edges = extract_top_k(input, top_k)
		.with_context(|| format!("Top-K extraction failed for {}", input.display()))?;

	storage::save_neighbors(output, &edges).context("Failed to write neighbor table")?;
	ui::success(&format!("Saved {} neighbor edges to {}", edges.len(), ui::path_link(output)));

	ui::summary(
		&[("Neighbor edges", edges.len().to_string())],
		start.elapsed().as_secs_f32(),
	);
	Ok(())
}
