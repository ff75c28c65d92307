//! Cluster command - group domains connected by rule edges

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;

use crate::config::ClusterParams;
use crate::core::FinalCluster;
use crate::processing::cluster_domains;
use crate::storage;
use crate::ui;

use super::edges::load_neighbor_sets;

pub fn run(
	edges_path: &Path,
	neighbors_path: &Path,
	output: &Path,
	params: ClusterParams,
	preview_count: usize,
) -> Result<()> {
	let start = Instant::now();

	ui::header("Clustering");
	let edges = storage::load_edges(edges_path).context("Failed to read rule edges")?;
	ui::success(&format!("Loaded {} rule edges", edges.len()));

	let sets = load_neighbor_sets(neighbors_path)?;
	let result = cluster_domains(&edges, &sets, params)?;

	storage::save_clusters(output, &result.clusters).context("Failed to write clusters")?;
	ui::success(&format!("Saved clusters to {}", ui::path_link(output)));

	print_clusters(&result.clusters, preview_count);
	ui::summary(
		&[
			("Components", result.report.components.to_string()),
			("Largest component", result.report.largest_component.to_string()),
			("Clusters", result.report.clusters.to_string()),
			("Largest cluster", result.report.largest_cluster.to_string()),
			("Contested domains", result.report.contested.to_string()),
		],
		start.elapsed().as_secs_f32(),
	);
	Ok(())
}

/// Largest clusters first, each truncated to `preview_count` members
pub fn print_clusters(clusters: &[FinalCluster], preview_count: usize) {
	if preview_count == 0 {
		return;
	}

	let mut order: Vec<usize> = (0..clusters.len()).collect();
	order.sort_by(|&a, &b| clusters[b].len().cmp(&clusters[a].len()));

	for &index in order.iter().take(preview_count) {
		let cluster = &clusters[index];
		println!(
			"\n{} {} ({} domains)",
			"Cluster".bright_white(),
			index.to_string().bright_cyan(),
			cluster.len()
		);

		for (i, domain) in cluster.iter().take(preview_count).enumerate() {
			println!("  {} {}", format!("[{}]", i + 1).dimmed(), domain);
		}

		if cluster.len() > preview_count {
			println!(
				"  {}",
				format!("... and {} more", cluster.len() - preview_count).dimmed()
			);
		}
	}

	if clusters.len() > preview_count {
		println!(
			"\n{}",
			format!("... and {} more clusters", clusters.len() - preview_count).dimmed()
		);
	}
}
