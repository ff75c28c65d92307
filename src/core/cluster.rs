//! Edge and cluster data structures shared by the pipeline stages

use serde::{Deserialize, Serialize};

/// Opaque entity identifier
pub type Domain = String;

/// Directed top-K relation: `domain2` is among the K most similar to `domain1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEdge {
	pub domain1: Domain,
	pub domain2: Domain,
	pub similarity: f32,
}

impl NeighborEdge {
	pub fn new(domain1: impl Into<Domain>, domain2: impl Into<Domain>, similarity: f32) -> Self {
		Self {
			domain1: domain1.into(),
			domain2: domain2.into(),
			similarity,
		}
	}
}

/// Undirected link between two domains with overlapping neighbor sets.
/// Persisted as a bare two-element array.
pub type RuleEdge = [Domain; 2];

/// One cluster of the final partition
pub type FinalCluster = Vec<Domain>;

/// Diagnostics collected while clustering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterReport {
	/// Connected components of the rule graph
	pub components: usize,
	/// Vertex count of the largest component
	pub largest_component: usize,
	/// Clusters remaining after conflict resolution
	pub clusters: usize,
	/// Member count of the largest cluster
	pub largest_cluster: usize,
	/// Domains that appeared in more than one augmented membership
	pub contested: usize,
	/// Domains assigned to a cluster
	pub assigned: usize,
}
