use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{PartitionStrategy, PipelineConfig, TieBreak, VoteWeighting};

fn parse_threshold(s: &str) -> Result<f64, String> {
	let val: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if !(0.0..=1.0).contains(&val) {
		Err(format!("threshold must be between 0.0 and 1.0, got {}", val))
	} else {
		Ok(val)
	}
}

fn parse_positive(s: &str) -> Result<usize, String> {
	match s.parse::<usize>() {
		Ok(0) => Err("must be at least 1".to_string()),
		Ok(val) => Ok(val),
		Err(_) => Err(format!("'{}' is not a valid count", s)),
	}
}

fn styles() -> Styles {
	let blue = Some(Color::Ansi(AnsiColor::Blue));
	Styles::styled()
		.header(Style::new().bold().fg_color(blue))
		.usage(Style::new().bold().fg_color(blue))
		.literal(Style::new().fg_color(blue))
		.placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
		.valid(Style::new().fg_color(blue))
		.invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
}

#[derive(Parser, Debug)]
#[command(
	name = "domgraph",
	author,
	version,
	about = "Cluster domains by overlap of their top-K similarity neighbors",
	styles = styles(),
	after_help = format!(
		"{title}
  {bin} {run}      {run_args}   {run_desc}
  {bin} {topk}     {topk_args}   {topk_desc}
  {bin} {edges}    {edges_args}   {edges_desc}",
		title = "Examples:".bright_blue().bold(),
		bin = "domgraph".bright_blue(),
		run = "run".yellow(),
		run_args = "-i ./similarity/ -o ./output/ -k 3",
		run_desc = "Full pipeline".dimmed(),
		topk = "topk".yellow(),
		topk_args = "-i ./similarity/ -o neighbors.json",
		topk_desc = "Neighbor extraction only".dimmed(),
		edges = "edges".yellow(),
		edges_args = "-i neighbors.json -o edges.json -t 0.6",
		edges_desc = "Rule edges only".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

/// Top-K stage parameters; unset values fall back to DOMGRAPH_TOP_K
#[derive(Args, Debug, Clone, Default)]
pub struct NeighborArgs {
	/// Neighbors kept per domain
	#[arg(short = 'k', long = "top-k", value_parser = parse_positive)]
	pub top_k: Option<usize>,
}

impl NeighborArgs {
	pub fn apply(&self, config: &mut PipelineConfig) {
		if let Some(top_k) = self.top_k {
			config.top_k = top_k;
		}
	}
}

/// Pair scan parameters; unset values fall back to DOMGRAPH_THRESHOLD and
/// DOMGRAPH_WORKERS
#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
	/// Minimum neighbor-set overlap ratio (0.0-1.0)
	#[arg(short = 't', long = "threshold", value_parser = parse_threshold)]
	pub threshold: Option<f64>,

	/// Worker threads for the pair scan (default: available cores)
	#[arg(short = 'w', long = "workers", value_parser = parse_positive)]
	pub workers: Option<usize>,

	/// How the pair scan is split across workers
	#[arg(long = "partition", value_enum)]
	pub partition: Option<PartitionStrategy>,

	/// Compare every pair instead of only pairs sharing a neighbor
	#[arg(long = "no-prefilter")]
	pub no_prefilter: bool,
}

impl ScanArgs {
	pub fn apply(&self, config: &mut PipelineConfig) {
		if let Some(threshold) = self.threshold {
			config.threshold = threshold;
		}
		if let Some(workers) = self.workers {
			config.workers = workers;
		}
		if let Some(partition) = self.partition {
			config.partition = partition;
		}
		if self.no_prefilter {
			config.prefilter = false;
		}
	}
}

/// Conflict resolution parameters; unset tie-break falls back to DOMGRAPH_TIE_BREAK
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
	/// How ties between equally voted clusters are broken
	#[arg(long = "tie-break", value_enum)]
	pub tie_break: Option<TieBreak>,

	/// How components vote for their augmented members
	#[arg(long = "votes", value_enum)]
	pub votes: Option<VoteWeighting>,
}

impl ResolveArgs {
	pub fn apply(&self, config: &mut PipelineConfig) {
		if let Some(tie_break) = self.tie_break {
			config.tie_break = tie_break;
		}
		if let Some(votes) = self.votes {
			config.vote_weighting = votes;
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run top-K extraction, rule edges and clustering in one go
	Run {
		/// Folder of similarity partitions
		#[arg(short = 'i', long = "input")]
		input: PathBuf,

		/// Folder receiving the three artifacts
		#[arg(short = 'o', long = "output", default_value = "output")]
		output: PathBuf,

		/// Clusters to print after the run
		#[arg(short = 'p', long = "preview", default_value_t = 5)]
		preview: usize,

		#[command(flatten)]
		neighbors: NeighborArgs,

		#[command(flatten)]
		scan: ScanArgs,

		#[command(flatten)]
		resolve: ResolveArgs,
	},

	/// Extract each domain's top-K most similar domains
	Topk {
		/// Folder of similarity partitions
		#[arg(short = 'i', long = "input")]
		input: PathBuf,

		/// Neighbor table to write (.json, .msgpack or .parquet)
		#[arg(short = 'o', long = "output")]
		output: PathBuf,

		#[command(flatten)]
		neighbors: NeighborArgs,
	},

	/// Link domains whose neighbor sets overlap
	Edges {
		/// Neighbor table produced by `topk`
		#[arg(short = 'i', long = "input")]
		input: PathBuf,

		/// Rule edge list to write
		#[arg(short = 'o', long = "output")]
		output: PathBuf,

		#[command(flatten)]
		scan: ScanArgs,
	},

	/// Cluster rule edges into disjoint domain groups
	Cluster {
		/// Rule edge list produced by `edges`
		#[arg(short = 'e', long = "edges")]
		edges: PathBuf,

		/// Neighbor table produced by `topk`
		#[arg(short = 'n', long = "neighbors")]
		neighbors: PathBuf,

		/// Cluster list to write
		#[arg(short = 'o', long = "output")]
		output: PathBuf,

		/// Clusters to print
		#[arg(short = 'p', long = "preview", default_value_t = 5)]
		preview: usize,

		#[command(flatten)]
		resolve: ResolveArgs,
	},
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn run_flags_override_config() {
		let cli = Cli::try_parse_from([
			"domgraph", "run", "-i", "in", "-k", "4", "-t", "0.75", "-w", "3",
			"--tie-break", "stable-hash", "--no-prefilter", "-p", "2",
		])
		.unwrap();

		let Command::Run {
			preview,
			neighbors,
			scan,
			resolve,
			..
		} = cli.command
		else {
			panic!("expected run command");
		};

		let mut config = PipelineConfig::new("in".into(), "out".into());
		neighbors.apply(&mut config);
		scan.apply(&mut config);
		resolve.apply(&mut config);
		assert_eq!(preview, 2);
		assert_eq!(config.top_k, 4);
		assert_eq!(config.threshold, 0.75);
		assert_eq!(config.workers, 3);
		assert_eq!(config.tie_break, TieBreak::StableHash);
		assert!(!config.prefilter);
	}

	#[test]
	fn stage_commands_only_take_their_own_flags() {
		let topk = ["domgraph", "topk", "-i", "in", "-o", "n.json"];
		assert!(Cli::try_parse_from(topk.iter().chain(&["-k", "3"])).is_ok());
		assert!(Cli::try_parse_from(topk.iter().chain(&["-t", "0.5"])).is_err());
		assert!(Cli::try_parse_from(topk.iter().chain(&["--tie-break", "random"])).is_err());

		let edges = ["domgraph", "edges", "-i", "n.json", "-o", "e.json"];
		assert!(Cli::try_parse_from(edges.iter().chain(&["-w", "2"])).is_ok());
		assert!(Cli::try_parse_from(edges.iter().chain(&["-k", "3"])).is_err());
		assert!(Cli::try_parse_from(edges.iter().chain(&["--votes", "multiplicity"])).is_err());

		let cluster = ["domgraph", "cluster", "-e", "e.json", "-n", "n.json", "-o", "c.json"];
		assert!(Cli::try_parse_from(cluster.iter().chain(&["--votes", "multiplicity"])).is_ok());
		assert!(Cli::try_parse_from(cluster.iter().chain(&["-t", "0.5"])).is_err());
	}

	#[test]
	fn out_of_range_threshold_is_rejected() {
		let parsed = Cli::try_parse_from(["domgraph", "edges", "-i", "a", "-o", "b", "-t", "1.2"]);
		assert!(parsed.is_err());
		let parsed = Cli::try_parse_from(["domgraph", "edges", "-i", "a", "-o", "b", "-w", "0"]);
		assert!(parsed.is_err());
	}
}
