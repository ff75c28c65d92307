//! Pipeline error taxonomy

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the clustering stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
	/// Input table is missing required columns or has an inconsistent shape.
	#[error("Malformed input {}: {reason}", .path.display())]
	MalformedInput { path: PathBuf, reason: String },

	/// Invalid threshold, worker count or top-k. Raised before any work starts.
	#[error("Invalid configuration: {0}")]
	Configuration(String),

	/// A scan worker terminated abnormally. Fatal to the whole stage.
	#[error("Worker {worker} failed: {reason}")]
	WorkerFailure { worker: usize, reason: String },

	/// No rule edges to cluster, usually an upstream misconfiguration.
	#[error("Rule edge list is empty, nothing to cluster")]
	EmptyGraph,

	#[error("I/O error on {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Codec error on {}: {reason}", .path.display())]
	Codec { path: PathBuf, reason: String },
}

impl PipelineError {
	pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		Self::MalformedInput {
			path: path.into(),
			reason: reason.into(),
		}
	}

	pub fn config(reason: impl Into<String>) -> Self {
		Self::Configuration(reason.into())
	}
}
