//! Neighbor-overlap rule engine
//!
//! Links two domains when their top-K neighbor sets overlap:
//! `|S(a) ∩ S(b)| / min(|S(a)|, |S(b)|) >= threshold`. Every pair `i < j` of
//! the domain list is a candidate. The outer index is split into one range
//! per worker of a dedicated rayon pool; workers only read the shared
//! [`NeighborSets`], so the scan takes no locks.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use crate::config::{PartitionStrategy, RuleParams};
use crate::core::{NeighborSets, RuleEdge};
use crate::error::{PipelineError, Result};
use crate::ui;

/// Split `0..n` into exactly `workers` ranges that cover it once.
pub fn partition_ranges(n: usize, workers: usize, strategy: PartitionStrategy) -> Vec<Range<usize>> {
	let workers = workers.max(1);
	match strategy {
		PartitionStrategy::Contiguous => contiguous_ranges(n, workers),
		PartitionStrategy::Balanced => balanced_ranges(n, workers),
	}
}

/// `chunk = n / workers`, last range absorbs the remainder. The first
/// ranges carry far more comparisons than the last ones.
fn contiguous_ranges(n: usize, workers: usize) -> Vec<Range<usize>> {
	let chunk = n / workers;
	(0..workers)
		.map(|w| {
			let end = if w + 1 < workers { (w + 1) * chunk } else { n };
			w * chunk..end
		})
		.collect()
}

/// Cut points chosen on the cumulative comparison count, row `i` costing
/// `n - 1 - i`, so each range holds about `n(n-1) / 2w` comparisons.
fn balanced_ranges(n: usize, workers: usize) -> Vec<Range<usize>> {
	let total = pair_count(n);
	let mut ranges = Vec::with_capacity(workers);
	let mut start = 0;
	let mut cursor = 0;
	let mut done: u128 = 0;

	for w in 0..workers {
		if w + 1 == workers {
			ranges.push(start..n);
			break;
		}
		let target = total * (w as u128 + 1) / workers as u128;
		while cursor < n && done < target {
			done += (n - 1 - cursor) as u128;
			cursor += 1;
		}
		ranges.push(start..cursor);
		start = cursor;
	}

	ranges
}

fn pair_count(n: usize) -> u128 {
	let n = n as u128;
	n * n.saturating_sub(1) / 2
}

/// Comparisons performed when scanning `range` of an `n`-domain list
pub fn range_cost(range: &Range<usize>, n: usize) -> u128 {
	range.clone().map(|i| (n - 1 - i) as u128).sum()
}

/// Size of the intersection of two sorted, deduplicated slices
fn intersection_len(a: &[u32], b: &[u32]) -> usize {
	let (mut i, mut j, mut count) = (0, 0, 0);
	while i < a.len() && j < b.len() {
		match a[i].cmp(&b[j]) {
			std::cmp::Ordering::Less => i += 1,
			std::cmp::Ordering::Greater => j += 1,
			std::cmp::Ordering::Equal => {
				count += 1;
				i += 1;
				j += 1;
			}
		}
	}
	count
}

/// Overlap ratio of two neighbor sets, `None` when either is empty
pub fn overlap_ratio(a: &[u32], b: &[u32]) -> Option<f64> {
	let min_size = a.len().min(b.len());
	if min_size == 0 {
		return None;
	}
	Some(ratio(intersection_len(a, b), min_size))
}

fn ratio(intersection: usize, min_size: usize) -> f64 {
	intersection as f64 / min_size as f64
}

/// Inverted index: neighbor id -> ascending scan positions that list it
struct Postings {
	lists: Vec<Vec<usize>>,
}

impl Postings {
	fn build(sets: &NeighborSets) -> Self {
		let mut lists = vec![Vec::new(); sets.domain_count()];
		for position in 0..sets.len() {
			for &id in sets.set_at(position) {
				lists[id as usize].push(position);
			}
		}
		Self { lists }
	}
}

/// Compare every `i` in `range` against all `j > i`
fn scan_exhaustive(sets: &NeighborSets, range: Range<usize>, threshold: f64) -> Vec<(usize, usize)> {
	let n = sets.len();
	let mut pairs = Vec::new();

	for i in range {
		let left = sets.set_at(i);
		for j in i + 1..n {
			if overlap_ratio(left, sets.set_at(j)).is_some_and(|r| r >= threshold) {
				pairs.push((i, j));
			}
		}
	}

	pairs
}

/// Same result as [`scan_exhaustive`] for `threshold > 0`: only `j` sharing a
/// neighbor with `i` are visited, and the posting hits give the intersection.
fn scan_indexed(
	sets: &NeighborSets,
	postings: &Postings,
	range: Range<usize>,
	threshold: f64,
) -> Vec<(usize, usize)> {
	let mut pairs = Vec::new();
	let mut hits = vec![0usize; sets.len()];
	let mut touched = Vec::new();

	for i in range {
		let left = sets.set_at(i);
		for &id in left {
			let list = &postings.lists[id as usize];
			let from = list.partition_point(|&p| p <= i);
			for &j in &list[from..] {
				if hits[j] == 0 {
					touched.push(j);
				}
				hits[j] += 1;
			}
		}

		touched.sort_unstable();
		for &j in &touched {
			let min_size = left.len().min(sets.set_at(j).len());
			if min_size > 0 && ratio(hits[j], min_size) >= threshold {
				pairs.push((i, j));
			}
			hits[j] = 0;
		}
		touched.clear();
	}

	pairs
}

/// Run `scan` once per range on a pool of `workers` threads and concatenate
/// the results in range order. A panicking worker fails the whole call.
pub fn run_partitioned<T, F>(ranges: &[Range<usize>], workers: usize, scan: F) -> Result<Vec<T>>
where
	T: Send,
	F: Fn(usize, Range<usize>) -> Vec<T> + Sync,
{
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(workers)
		.thread_name(|i| format!("rule-scan-{}", i))
		.build()
		.map_err(|e| PipelineError::WorkerFailure {
			worker: 0,
			reason: format!("could not start worker pool: {}", e),
		})?;

	let results: Vec<Result<Vec<T>>> = pool.install(|| {
		ranges
			.par_iter()
			.enumerate()
			.map(|(worker, range)| {
				panic::catch_unwind(AssertUnwindSafe(|| scan(worker, range.clone()))).map_err(|payload| {
					PipelineError::WorkerFailure {
						worker,
						reason: panic_message(payload.as_ref()),
					}
				})
			})
			.collect()
	});

	let mut out = Vec::new();
	for result in results {
		out.extend(result?);
	}
	Ok(out)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&str>() {
		msg.to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"worker panicked".to_string()
	}
}

/// Build the rule edge list for `sets`.
pub fn create_rule_edges(sets: &NeighborSets, params: &RuleParams) -> Result<Vec<RuleEdge>> {
	let n = sets.len();
	let workers = params.workers();
	let threshold = params.threshold();

	ui::info(&format!(
		"Scanning {} domains ({} pairs) with {} workers",
		n,
		pair_count(n),
		workers
	));

	let ranges = partition_ranges(n, workers, params.partition);
	for (worker, range) in ranges.iter().enumerate() {
		ui::info(&format!(
			"Worker {}: indices {}..{} ({} comparisons)",
			worker,
			range.start,
			range.end,
			range_cost(range, n)
		));
	}

	// Pairs with an empty intersection still pass a zero threshold
	let postings = (params.prefilter && threshold > 0.0).then(|| Postings::build(sets));
	if postings.is_some() {
		ui::debug("Using inverted-index prefilter");
	}

	let pairs = run_partitioned(&ranges, workers, |_, range| match &postings {
		Some(postings) => scan_indexed(sets, postings, range, threshold),
		None => scan_exhaustive(sets, range, threshold),
	})?;

	let edges: Vec<RuleEdge> = pairs
		.into_iter()
		.map(|(i, j)| [sets.domain_at(i).to_string(), sets.domain_at(j).to_string()])
		.collect();

	ui::success(&format!("Created {} rule edges", edges.len()));
	Ok(edges)
}
