//! Artifact storage and partition discovery

pub mod artifact;
pub mod parquet;
pub mod partitions;

pub use artifact::{
	load_clusters, load_edges, load_neighbors, load_partition, save_clusters, save_edges,
	save_neighbors,
};
pub use partitions::list_partitions;
