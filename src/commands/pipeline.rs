//! Run command - all three stages back to back

use std::time::Instant;

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::core::NeighborSets;
use crate::processing::{cluster_domains, create_rule_edges, extract_top_k};
use crate::storage;
use crate::ui;

use super::cluster::print_clusters;

/// Each stage persists its artifact before the next one starts
pub fn run(config: &PipelineConfig, preview_count: usize) -> Result<()> {
	config.validate()?;
	let rule_params = config.rule_params()?;
	let start = Instant::now();

	ui::header("Top-K neighbors");
	let stage = Instant::now();
	let neighbors = extract_top_k(&config.input_dir, config.top_k)
		.with_context(|| format!("Top-K extraction failed for {}", config.input_dir.display()))?;
	storage::save_neighbors(&config.neighbors_path(), &neighbors).context("Failed to write neighbor table")?;
	ui::success(&format!(
		"{} neighbor edges in {:.1}s",
		neighbors.len(),
		stage.elapsed().as_secs_f32()
	));

	ui::header("Rule edges");
	let stage = Instant::now();
	let sets = NeighborSets::from_edges(&neighbors);
	drop(neighbors);
	let edges = create_rule_edges(&sets, &rule_params)?;
	storage::save_edges(&config.edges_path(), &edges).context("Failed to write rule edges")?;
	ui::debug(&format!("Rule stage took {:.1}s", stage.elapsed().as_secs_f32()));

	ui::header("Clustering");
	let result = cluster_domains(&edges, &sets, config.cluster_params())?;
	storage::save_clusters(&config.clusters_path(), &result.clusters).context("Failed to write clusters")?;
	ui::success(&format!("Saved clusters to {}", ui::path_link(&config.clusters_path())));

	print_clusters(&result.clusters, preview_count);
	ui::summary(
		&[
			("Domains", sets.len().to_string()),
			("Rule edges", edges.len().to_string()),
			("Components", result.report.components.to_string()),
			("Largest component", result.report.largest_component.to_string()),
			("Clusters", result.report.clusters.to_string()),
			("Largest cluster", result.report.largest_cluster.to_string()),
		],
		start.elapsed().as_secs_f32(),
	);
	Ok(())
}
