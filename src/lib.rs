//! # domgraph
//!
//! Transitive-similarity clustering of domains. A dense similarity table is
//! reduced to top-K neighbor edges, domains whose neighbor sets overlap are
//! linked by rule edges, and the resulting graph is split into disjoint
//! clusters with majority-membership conflict resolution.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod storage;
pub mod ui;

pub use error::{PipelineError, Result};
