//! domgraph - cluster domains by neighbor-set overlap
//!
//! Thin command-line wrapper around the library stages.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use domgraph::cli::{Cli, Command};
use domgraph::commands;
use domgraph::config::PipelineConfig;
use domgraph::ui::{self, Log};

fn main() {
	let cli = Cli::parse();
	Log::set_verbose(cli.verbose);

	if let Err(e) = run(cli.command) {
		ui::error(&format!("{:#}", e));
		std::process::exit(1);
	}
}

fn run(command: Command) -> Result<()> {
	print_header();

	match command {
		Command::Run {
			input,
			output,
			preview,
			neighbors,
			scan,
			resolve,
		} => {
			let mut config = PipelineConfig::from_env(input, output)?;
			neighbors.apply(&mut config);
			scan.apply(&mut config);
			resolve.apply(&mut config);
			commands::pipeline::run(&checked(config)?, preview)
		}
		Command::Topk {
			input,
			output,
			neighbors,
		} => {
			let mut config = PipelineConfig::new(input.clone(), PathBuf::new()).with_neighbor_env()?;
			neighbors.apply(&mut config);
			commands::topk::run(&input, &output, checked(config)?.top_k)
		}
		Command::Edges { input, output, scan } => {
			let mut config = PipelineConfig::new(PathBuf::new(), PathBuf::new()).with_scan_env()?;
			scan.apply(&mut config);
			commands::edges::run(&input, &output, &checked(config)?.rule_params()?)
		}
		Command::Cluster {
			edges,
			neighbors,
			output,
			preview,
			resolve,
		} => {
			let mut config = PipelineConfig::new(PathBuf::new(), PathBuf::new()).with_resolve_env()?;
			resolve.apply(&mut config);
			let params = checked(config)?.cluster_params();
			commands::cluster::run(&edges, &neighbors, &output, params, preview)
		}
	}
}

/// Defaults, then environment, then flags
fn checked(config: PipelineConfig) -> Result<PipelineConfig> {
	config.validate()?;
	ui::debug(&format!("{:?}", config));
	Ok(config)
}

fn print_header() {
	println!();
	println!(
		"{}",
		format!("─── domgraph v{} ───", env!("CARGO_PKG_VERSION"))
			.bright_blue()
			.bold()
	);
}
