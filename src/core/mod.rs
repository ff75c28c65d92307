//! Core domain types

pub mod cluster;
pub mod table;

pub use cluster::{ClusterReport, Domain, FinalCluster, NeighborEdge, RuleEdge};
pub use table::{group_by, Grouped, NeighborRecord, NeighborSets, SimilarityPartition};
