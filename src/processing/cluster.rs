//! Rule-graph clustering with majority-membership conflict resolution

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::Rng;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::{ClusterParams, TieBreak, VoteWeighting};
use crate::core::{ClusterReport, FinalCluster, NeighborSets, RuleEdge};
use crate::error::{PipelineError, Result};
use crate::ui;

/// Candidate component index -> vote count, ascending by index
pub type Votes = BTreeMap<usize, u32>;

struct UnionFind {
	parent: Vec<usize>,
	size: Vec<usize>,
}

impl UnionFind {
	fn new(n: usize) -> Self {
		Self {
			parent: (0..n).collect(),
			size: vec![1; n],
		}
	}

	fn find(&mut self, x: usize) -> usize {
		let mut root = x;
		while self.parent[root] != root {
			root = self.parent[root];
		}
		let mut cur = x;
		while self.parent[cur] != root {
			let next = self.parent[cur];
			self.parent[cur] = root;
			cur = next;
		}
		root
	}

	fn union(&mut self, a: usize, b: usize) {
		let (mut big, mut small) = (self.find(a), self.find(b));
		if big == small {
			return;
		}
		if self.size[big] < self.size[small] {
			std::mem::swap(&mut big, &mut small);
		}
		self.parent[small] = big;
		self.size[big] += self.size[small];
	}
}

/// Connected components of the undirected graph spanned by `edges`.
///
/// Vertices are numbered in order of first appearance; components are
/// ordered by their earliest vertex and list members in that same order.
pub fn connected_components(edges: &[RuleEdge]) -> Vec<Vec<&str>> {
	let mut ids: HashMap<&str, usize> = HashMap::new();
	let mut names: Vec<&str> = Vec::new();
	let mut links = Vec::with_capacity(edges.len());

	for [a, b] in edges {
		let mut pair = [0usize; 2];
		for (slot, name) in pair.iter_mut().zip([a.as_str(), b.as_str()]) {
			*slot = *ids.entry(name).or_insert_with(|| {
				names.push(name);
				names.len() - 1
			});
		}
		links.push((pair[0], pair[1]));
	}

	let mut uf = UnionFind::new(names.len());
	for (a, b) in links {
		uf.union(a, b);
	}

	let mut slot: HashMap<usize, usize> = HashMap::new();
	let mut components: Vec<Vec<&str>> = Vec::new();
	for (vertex, name) in names.iter().enumerate() {
		let root = uf.find(vertex);
		let index = *slot.entry(root).or_insert_with(|| {
			components.push(Vec::new());
			components.len() - 1
		});
		components[index].push(*name);
	}

	components
}

/// Votes each domain receives from the components whose augmented
/// membership (vertices plus their neighbor sets) contains it.
pub fn tally_votes<'a>(
	components: &[Vec<&'a str>],
	sets: &'a NeighborSets,
	weighting: VoteWeighting,
) -> HashMap<&'a str, Votes> {
	let mut votes: HashMap<&'a str, Votes> = HashMap::new();
	let mut cast = |domain: &'a str, component: usize| {
		*votes.entry(domain).or_default().entry(component).or_insert(0) += 1;
	};

	for (index, members) in components.iter().enumerate() {
		match weighting {
			VoteWeighting::Membership => {
				let mut augmented: HashSet<&'a str> = HashSet::new();
				for &vertex in members {
					augmented.insert(vertex);
					augmented.extend(sets.neighbors(vertex));
				}
				for domain in augmented {
					cast(domain, index);
				}
			}
			VoteWeighting::Multiplicity => {
				for &vertex in members {
					cast(vertex, index);
					for neighbor in sets.neighbors(vertex) {
						cast(neighbor, index);
					}
				}
			}
		}
	}

	votes
}

/// Pick one component among those holding the highest vote
pub fn resolve(domain: &str, votes: &Votes, rule: TieBreak) -> Option<usize> {
	let best = *votes.values().max()?;
	let tied: Vec<usize> = votes
		.iter()
		.filter(|&(_, &count)| count == best)
		.map(|(&index, _)| index)
		.collect();

	match rule {
		TieBreak::LowestIndex => tied.first().copied(),
		TieBreak::StableHash => tied
			.iter()
			.copied()
			.min_by_key(|index| xxh3_64(format!("{}\u{1f}{}", domain, index).as_bytes())),
		TieBreak::Random => {
			let pick = rand::rng().random_range(0..tied.len());
			tied.get(pick).copied()
		}
	}
}

/// Final partition plus the diagnostics gathered on the way
#[derive(Debug, Clone)]
pub struct Clustering {
	pub clusters: Vec<FinalCluster>,
	pub report: ClusterReport,
}

/// Cluster the rule graph and assign every reachable domain to exactly one
/// cluster.
pub fn cluster_domains(edges: &[RuleEdge], sets: &NeighborSets, params: ClusterParams) -> Result<Clustering> {
	if edges.is_empty() {
		return Err(PipelineError::EmptyGraph);
	}

	let components = connected_components(edges);
	let largest_component = components.iter().map(Vec::len).max().unwrap_or(0);
	ui::info(&format!(
		"Found {} components, largest has {} domains",
		components.len(),
		largest_component
	));

	let votes = tally_votes(&components, sets, params.vote_weighting);
	let contested = votes.values().filter(|v| v.len() > 1).count();
	ui::debug(&format!(
		"{} domains in augmented memberships, {} contested",
		votes.len(),
		contested
	));

	let mut groups: Vec<Vec<&str>> = vec![Vec::new(); components.len()];
	for (&domain, candidates) in &votes {
		if let Some(index) = resolve(domain, candidates, params.tie_break) {
			groups[index].push(domain);
		}
	}

	let clusters: Vec<FinalCluster> = groups
		.into_iter()
		.filter(|group| !group.is_empty())
		.map(|mut group| {
			group.sort_unstable();
			group.into_iter().map(String::from).collect()
		})
		.collect();

	let report = ClusterReport {
		components: components.len(),
		largest_component,
		clusters: clusters.len(),
		largest_cluster: clusters.iter().map(Vec::len).max().unwrap_or(0),
		contested,
		assigned: clusters.iter().map(Vec::len).sum(),
	};

	ui::success(&format!(
		"Assigned {} domains to {} clusters",
		report.assigned, report.clusters
	));

	Ok(Clustering { clusters, report })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::NeighborEdge;

	fn edge(a: &str, b: &str) -> RuleEdge {
		[a.to_string(), b.to_string()]
	}

	fn sets(groups: &[(&str, &[&str])]) -> NeighborSets {
		let edges: Vec<NeighborEdge> = groups
			.iter()
			.flat_map(|(d1, ns)| ns.iter().map(move |d2| NeighborEdge::new(*d1, *d2, 0.5)))
			.collect();
		NeighborSets::from_edges(&edges)
	}

	fn shared_neighbor_fixture() -> (Vec<RuleEdge>, NeighborSets) {
		let edges = vec![edge("A", "B"), edge("C", "D")];
		let sets = sets(&[
			("A", &["B", "X"]),
			("B", &["A"]),
			("C", &["D", "X"]),
			("D", &["C"]),
		]);
		(edges, sets)
	}

	fn assert_partition(clusters: &[FinalCluster]) {
		let mut seen = HashSet::new();
		for cluster in clusters {
			assert!(!cluster.is_empty());
			for domain in cluster {
				assert!(seen.insert(domain.clone()), "{} assigned twice", domain);
			}
		}
	}

	#[test]
	fn disconnected_edges_form_separate_components() {
		let edges = vec![edge("A", "B"), edge("C", "D")];
		let components = connected_components(&edges);
		assert_eq!(components, vec![vec!["A", "B"], vec!["C", "D"]]);
	}

	#[test]
	fn duplicate_and_chained_edges_merge() {
		let edges = vec![edge("A", "B"), edge("B", "A"), edge("C", "D"), edge("B", "C"), edge("E", "F")];
		let components = connected_components(&edges);
		assert_eq!(components.len(), 2);
		assert_eq!(components[0], vec!["A", "B", "C", "D"]);
		assert_eq!(components[1], vec!["E", "F"]);
	}

	#[test]
	fn shared_neighbor_is_counted_once_per_component() {
		let (edges, sets) = shared_neighbor_fixture();
		let components = connected_components(&edges);
		let votes = tally_votes(&components, &sets, VoteWeighting::Membership);

		let x = &votes["X"];
		assert_eq!(x, &Votes::from([(0, 1), (1, 1)]));
		assert_eq!(votes["A"], Votes::from([(0, 1)]));
	}

	#[test]
	fn multiplicity_counts_every_reference() {
		let (edges, sets) = shared_neighbor_fixture();
		let components = connected_components(&edges);
		let votes = tally_votes(&components, &sets, VoteWeighting::Multiplicity);

		// A: vertex of component 0 and neighbor of B
		assert_eq!(votes["A"], Votes::from([(0, 2)]));
		assert_eq!(votes["X"], Votes::from([(0, 1), (1, 1)]));
	}

	#[test]
	fn lowest_index_resolves_shared_neighbor() {
		let (edges, sets) = shared_neighbor_fixture();
		let result = cluster_domains(&edges, &sets, ClusterParams::default()).unwrap();

		assert_eq!(
			result.clusters,
			vec![
				vec!["A".to_string(), "B".into(), "X".into()],
				vec!["C".to_string(), "D".into()],
			]
		);
		assert_eq!(result.report.components, 2);
		assert_eq!(result.report.largest_component, 2);
		assert_eq!(result.report.contested, 1);
		assert_eq!(result.report.assigned, 5);
	}

	#[test]
	fn majority_beats_tie_break() {
		let edges = vec![edge("A", "B"), edge("C", "D")];
		let sets = sets(&[("A", &["X"]), ("B", &["X"]), ("C", &["X"])]);
		let components = connected_components(&edges);
		let votes = tally_votes(&components, &sets, VoteWeighting::Multiplicity);

		assert_eq!(resolve("X", &votes["X"], TieBreak::LowestIndex), Some(0));
		let votes = Votes::from([(0, 1), (1, 3)]);
		assert_eq!(resolve("X", &votes, TieBreak::LowestIndex), Some(1));
		assert_eq!(resolve("X", &votes, TieBreak::Random), Some(1));
	}

	#[test]
	fn stable_hash_is_reproducible_and_picks_a_tied_index() {
		let votes = Votes::from([(0, 2), (3, 2), (5, 1)]);
		let first = resolve("example.com", &votes, TieBreak::StableHash);
		assert!(matches!(first, Some(0) | Some(3)));
		for _ in 0..10 {
			assert_eq!(resolve("example.com", &votes, TieBreak::StableHash), first);
		}
	}

	#[test]
	fn every_tie_break_yields_a_partition() {
		let (edges, sets) = shared_neighbor_fixture();
		for rule in [TieBreak::LowestIndex, TieBreak::StableHash, TieBreak::Random] {
			for weighting in [VoteWeighting::Membership, VoteWeighting::Multiplicity] {
				let params = ClusterParams {
					tie_break: rule,
					vote_weighting: weighting,
				};
				let result = cluster_domains(&edges, &sets, params).unwrap();
				assert_partition(&result.clusters);
				assert_eq!(result.report.assigned, 5);
			}
		}
	}

	#[test]
	fn empty_edge_list_is_an_error() {
		let err = cluster_domains(&[], &NeighborSets::default(), ClusterParams::default()).unwrap_err();
		assert!(matches!(err, PipelineError::EmptyGraph));
	}

	#[test]
	fn vertices_missing_from_neighbor_sets_still_cluster() {
		let edges = vec![edge("P", "Q")];
		let result = cluster_domains(&edges, &NeighborSets::default(), ClusterParams::default()).unwrap();
		assert_eq!(result.clusters, vec![vec!["P".to_string(), "Q".into()]]);
	}
}
