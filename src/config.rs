//! Application configuration and constants

use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// === Stage Defaults ===
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const FALLBACK_WORKERS: usize = 4;

// === Input Schema ===
pub const INDEX_COLUMN: &str = "domain_";
/// Bookkeeping columns that may leak into `columns` from the producing job
pub const IGNORED_COLUMNS: &[&str] = &[INDEX_COLUMN, "__null_dask_index__"];
pub const PARTITION_EXTENSIONS: &[&str] = &["json", "msgpack", "parquet"];

// === Artifacts ===
pub const NEIGHBORS_FILE: &str = "top_k_nearest_neighbors.json";
pub const EDGES_FILE: &str = "rule_edges.json";
pub const CLUSTERS_FILE: &str = "final_clusters.json";
pub const MSGPACK_EXT: &str = "msgpack";
pub const PARQUET_EXT: &str = "parquet";

// === Environment ===
pub const ENV_TOP_K: &str = "DOMGRAPH_TOP_K";
pub const ENV_THRESHOLD: &str = "DOMGRAPH_THRESHOLD";
pub const ENV_WORKERS: &str = "DOMGRAPH_WORKERS";
pub const ENV_TIE_BREAK: &str = "DOMGRAPH_TIE_BREAK";

/// How the outer index of the all-pairs scan is split across workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum PartitionStrategy {
	/// Equal-length ranges, last worker takes the remainder
	Contiguous,
	/// Ranges sized so each carries about the same number of comparisons
	#[default]
	Balanced,
}

/// Rule for picking one cluster when several share the top vote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum TieBreak {
	/// Smallest component index wins
	#[default]
	LowestIndex,
	/// Smallest xxh3 hash of domain + component index wins
	StableHash,
	/// Unseeded uniform choice (not reproducible)
	Random,
}

impl FromStr for TieBreak {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self> {
		<Self as ValueEnum>::from_str(s, true)
			.map_err(|_| PipelineError::config(format!("unknown tie-break '{}'", s)))
	}
}

/// How a component votes for the domains in its augmented membership
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum VoteWeighting {
	/// One vote per component containing the domain
	#[default]
	Membership,
	/// One vote per vertex occurrence plus one per referencing vertex
	Multiplicity,
}

/// Parameters of the rule engine, validated on construction
#[derive(Debug, Clone, Copy)]
pub struct RuleParams {
	threshold: f64,
	workers: usize,
	pub partition: PartitionStrategy,
	pub prefilter: bool,
}

impl RuleParams {
	pub fn new(threshold: f64, workers: usize) -> Result<Self> {
		validate_threshold(threshold)?;
		validate_workers(workers)?;
		Ok(Self {
			threshold,
			workers,
			partition: PartitionStrategy::default(),
			prefilter: true,
		})
	}

	pub fn with_partition(mut self, partition: PartitionStrategy) -> Self {
		self.partition = partition;
		self
	}

	pub fn with_prefilter(mut self, prefilter: bool) -> Self {
		self.prefilter = prefilter;
		self
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	pub fn workers(&self) -> usize {
		self.workers
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterParams {
	pub tie_break: TieBreak,
	pub vote_weighting: VoteWeighting,
}

/// Full pipeline configuration resolved from defaults, environment and CLI
#[derive(Debug, Clone)]
pub struct PipelineConfig {
	pub input_dir: PathBuf,
	pub output_dir: PathBuf,
	pub top_k: usize,
	pub threshold: f64,
	pub workers: usize,
	pub partition: PartitionStrategy,
	pub prefilter: bool,
	pub tie_break: TieBreak,
	pub vote_weighting: VoteWeighting,
}

impl PipelineConfig {
	/// Built-in defaults, no environment lookup
	pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
		Self {
			input_dir,
			output_dir,
			top_k: DEFAULT_TOP_K,
			threshold: DEFAULT_THRESHOLD,
			workers: default_workers(),
			partition: PartitionStrategy::default(),
			prefilter: true,
			tie_break: TieBreak::default(),
			vote_weighting: VoteWeighting::default(),
		}
	}

	/// Overlay `DOMGRAPH_TOP_K`
	pub fn with_neighbor_env(mut self) -> Result<Self> {
		self.top_k = env_or(ENV_TOP_K, self.top_k)?;
		Ok(self)
	}

	/// Overlay `DOMGRAPH_THRESHOLD` and `DOMGRAPH_WORKERS`
	pub fn with_scan_env(mut self) -> Result<Self> {
		self.threshold = env_or(ENV_THRESHOLD, self.threshold)?;
		self.workers = env_or(ENV_WORKERS, self.workers)?;
		Ok(self)
	}

	/// Overlay `DOMGRAPH_TIE_BREAK`
	pub fn with_resolve_env(mut self) -> Result<Self> {
		self.tie_break = env_or(ENV_TIE_BREAK, self.tie_break)?;
		Ok(self)
	}

	/// Defaults overlaid with every `DOMGRAPH_*` environment variable
	pub fn from_env(input_dir: PathBuf, output_dir: PathBuf) -> Result<Self> {
		Self::new(input_dir, output_dir)
			.with_neighbor_env()?
			.with_scan_env()?
			.with_resolve_env()
	}

	pub fn validate(&self) -> Result<()> {
		validate_top_k(self.top_k)?;
		validate_threshold(self.threshold)?;
		validate_workers(self.workers)
	}

	pub fn rule_params(&self) -> Result<RuleParams> {
		Ok(RuleParams::new(self.threshold, self.workers)?
			.with_partition(self.partition)
			.with_prefilter(self.prefilter))
	}

	pub fn cluster_params(&self) -> ClusterParams {
		ClusterParams {
			tie_break: self.tie_break,
			vote_weighting: self.vote_weighting,
		}
	}

	pub fn neighbors_path(&self) -> PathBuf {
		self.output_dir.join(NEIGHBORS_FILE)
	}

	pub fn edges_path(&self) -> PathBuf {
		self.output_dir.join(EDGES_FILE)
	}

	pub fn clusters_path(&self) -> PathBuf {
		self.output_dir.join(CLUSTERS_FILE)
	}
}

pub fn default_workers() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(FALLBACK_WORKERS)
}

pub fn validate_top_k(top_k: usize) -> Result<()> {
	if top_k < 1 {
		return Err(PipelineError::config("top_k must be at least 1"));
	}
	Ok(())
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
	if !(0.0..=1.0).contains(&threshold) {
		return Err(PipelineError::config(format!(
			"overlap threshold must be within [0, 1], got {}",
			threshold
		)));
	}
	Ok(())
}

pub fn validate_workers(workers: usize) -> Result<()> {
	if workers < 1 {
		return Err(PipelineError::config("worker count must be at least 1"));
	}
	Ok(())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
	T: FromStr,
{
	match std::env::var(key) {
		Ok(raw) => {
			crate::ui::debug(&format!("Using {}={}", key, raw));
			raw.trim()
				.parse()
				.map_err(|_| PipelineError::config(format!("{} has invalid value '{}'", key, raw)))
		}
		Err(_) => Ok(default),
	}
}
