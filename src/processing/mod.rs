//! Pipeline stages: top-K extraction, rule edges, clustering

pub mod cluster;
pub mod rules;
pub mod topk;

pub use cluster::{cluster_domains, Clustering};
pub use rules::create_rule_edges;
pub use topk::extract_top_k;
