//! # Command Implementations
//!
//! Each submodule handles one CLI command (topk, edges, cluster, run).

pub mod cluster;
pub mod edges;
pub mod pipeline;
pub mod topk;
