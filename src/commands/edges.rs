//! Edges command - link domains whose neighbor sets overlap

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::config::RuleParams;
use crate::core::NeighborSets;
use crate::processing::create_rule_edges;
use crate::storage;
use crate::ui;

/// Load a neighbor table and group it into read-only neighbor sets
pub fn load_neighbor_sets(path: &Path) -> Result<NeighborSets> {
	ui::info(&format!("Loading neighbor table {}", ui::path_link(path)));
	let records = storage::load_neighbors(path).context("Failed to read neighbor table")?;
	let total = records.len();

	let sets = NeighborSets::from_records(records);
	if sets.dropped() > 0 {
		ui::warn(&format!("Dropped {} of {} rows with missing fields", sets.dropped(), total));
	}
	ui::debug(&format!(
		"{} source domains, {} distinct domains overall",
		sets.len(),
		sets.domain_count()
	));
	Ok(sets)
}

pub fn run(input: &Path, output: &Path, params: &RuleParams) -> Result<()> {
	let start = Instant::now();

	ui::header("Rule edges");
	let sets = load_neighbor_sets(input)?;
	let edges = create_rule_edges(&sets, params)?;

	storage::save_edges(output, &edges).context("Failed to write rule edges")?;
	ui::success(&format!("Saved rule edges to {}", ui::path_link(output)));

	ui::summary(
		&[
			("Domains", sets.len().to_string()),
			("Threshold", format!("{:.2}", params.threshold())),
			("Rule edges", edges.len().to_string()),
		],
		start.elapsed().as_secs_f32(),
	);
	Ok(())
}
