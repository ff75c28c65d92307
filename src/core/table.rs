//! Typed tables exchanged between stages

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{IGNORED_COLUMNS, INDEX_COLUMN};
use crate::core::{Domain, NeighborEdge};
use crate::error::{PipelineError, Result};

/// One partition of the pairwise similarity table, in wide form.
///
/// `domains` is the row identifier column, `columns` labels the compared
/// domains and `values[row][col]` holds their similarity (`null` if absent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityPartition {
	#[serde(rename = "domain_", default)]
	pub domains: Option<Vec<Domain>>,
	#[serde(default)]
	pub columns: Vec<Domain>,
	#[serde(default)]
	pub values: Vec<Vec<Option<f32>>>,
}

impl SimilarityPartition {
	/// Decode a partition from either layout: the columnar
	/// `{domain_, columns, values}` object, or an array holding one object per
	/// row with a `domain_` key and one numeric field per compared domain.
	pub fn from_value(value: Value, path: &Path) -> Result<Self> {
		match value {
			Value::Array(rows) => Self::from_rows(rows, path),
			value => serde_json::from_value(value)
				.map_err(|e| PipelineError::malformed(path, e.to_string())),
		}
	}

	fn from_rows(rows: Vec<Value>, path: &Path) -> Result<Self> {
		let mut columns: Vec<Domain> = Vec::new();
		let mut positions: HashMap<Domain, usize> = HashMap::new();
		let mut domains = Vec::with_capacity(rows.len());
		let mut cells: Vec<Vec<(usize, Option<f32>)>> = Vec::with_capacity(rows.len());

		for (row, value) in rows.into_iter().enumerate() {
			let Value::Object(fields) = value else {
				return Err(PipelineError::malformed(path, format!("row {} is not an object", row)));
			};

			let mut domain = None;
			let mut row_cells = Vec::with_capacity(fields.len());
			for (name, cell) in fields {
				if name == INDEX_COLUMN {
					match cell {
						Value::String(d) => domain = Some(d),
						other => {
							return Err(PipelineError::malformed(
								path,
								format!("row {}: '{}' must be a string, got {}", row, INDEX_COLUMN, other),
							))
						}
					}
					continue;
				}
				if IGNORED_COLUMNS.contains(&name.as_str()) {
					continue;
				}

				let similarity = match cell {
					Value::Null => None,
					Value::Number(n) => n.as_f64().map(|v| v as f32),
					other => {
						return Err(PipelineError::malformed(
							path,
							format!("row {}, column '{}': expected a number, got {}", row, name, other),
						))
					}
				};

				let next = columns.len();
				let col = *positions.entry(name.clone()).or_insert_with(|| {
					columns.push(name);
					next
				});
				row_cells.push((col, similarity));
			}

			let Some(domain) = domain else {
				return Err(PipelineError::malformed(
					path,
					format!("row {} has no '{}' value", row, INDEX_COLUMN),
				));
			};
			domains.push(domain);
			cells.push(row_cells);
		}

		let width = columns.len();
		let values = cells
			.into_iter()
			.map(|row_cells| {
				let mut row = vec![None; width];
				for (col, similarity) in row_cells {
					row[col] = similarity;
				}
				row
			})
			.collect();

		Ok(Self {
			domains: Some(domains),
			columns,
			values,
		})
	}

	/// Checks the schema and returns the row identifiers together with the
	/// indices of the columns that can be ranked.
	pub fn validate(&self, path: &Path) -> Result<(&[Domain], Vec<usize>)> {
		let Some(domains) = self.domains.as_deref() else {
			return Err(PipelineError::malformed(
				path,
				format!("missing '{}' identifier column", INDEX_COLUMN),
			));
		};

		let comparable: Vec<usize> = self
			.columns
			.iter()
			.enumerate()
			.filter(|(_, name)| !IGNORED_COLUMNS.contains(&name.as_str()))
			.map(|(idx, _)| idx)
			.collect();

		if comparable.is_empty() {
			return Err(PipelineError::malformed(path, "no comparable similarity columns"));
		}

		if self.values.len() != domains.len() {
			return Err(PipelineError::malformed(
				path,
				format!(
					"{} identifiers but {} similarity rows",
					domains.len(),
					self.values.len()
				),
			));
		}

		if let Some((row, values)) = self
			.values
			.iter()
			.enumerate()
			.find(|(_, values)| values.len() != self.columns.len())
		{
			return Err(PipelineError::malformed(
				path,
				format!(
					"row {} has {} values, expected {}",
					row,
					values.len(),
					self.columns.len()
				),
			));
		}

		Ok((domains, comparable))
	}
}

/// A persisted neighbor edge as read back from disk; every field may be null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeighborRecord {
	#[serde(default)]
	pub domain1: Option<Domain>,
	#[serde(default)]
	pub domain2: Option<Domain>,
	#[serde(default)]
	pub similarity: Option<f32>,
}

impl NeighborRecord {
	/// Both endpoints present and non-empty, similarity finite
	fn into_pair(self) -> Option<(Domain, Domain)> {
		let domain1 = self.domain1.filter(|d| !d.is_empty())?;
		let domain2 = self.domain2.filter(|d| !d.is_empty())?;
		self.similarity.filter(|s| s.is_finite())?;
		Some((domain1, domain2))
	}
}

impl From<NeighborEdge> for NeighborRecord {
	fn from(edge: NeighborEdge) -> Self {
		Self {
			domain1: Some(edge.domain1),
			domain2: Some(edge.domain2),
			similarity: Some(edge.similarity),
		}
	}
}

/// Keys in first-seen order, each mapped to the set of its values
#[derive(Debug, Clone)]
pub struct Grouped<K, V> {
	pub keys: Vec<K>,
	pub groups: HashMap<K, HashSet<V>>,
}

/// Collapse `(key, value)` rows into `key -> set(value)`, keeping the order in
/// which keys were first encountered.
pub fn group_by<K, V, I>(rows: I) -> Grouped<K, V>
where
	I: IntoIterator<Item = (K, V)>,
	K: Eq + Hash + Clone,
	V: Eq + Hash,
{
	let mut keys = Vec::new();
	let mut groups: HashMap<K, HashSet<V>> = HashMap::new();

	for (key, value) in rows {
		groups
			.entry(key)
			.or_insert_with_key(|k| {
				keys.push(k.clone());
				HashSet::new()
			})
			.insert(value);
	}

	Grouped { keys, groups }
}

/// Read-only neighbor sets with every domain interned to a dense id.
///
/// Position `p` in `0..len()` addresses the p-th distinct `domain1` in
/// encounter order; its set is a sorted, deduplicated id slice. Nothing here
/// is mutated after construction, so workers share it by reference.
#[derive(Debug, Clone, Default)]
pub struct NeighborSets {
	names: Vec<Domain>,
	ids: HashMap<Domain, u32>,
	order: Vec<u32>,
	sets: Vec<Vec<u32>>,
	slots: Vec<Option<usize>>,
	dropped: usize,
}

impl NeighborSets {
	pub fn from_records<I>(records: I) -> Self
	where
		I: IntoIterator<Item = NeighborRecord>,
	{
		let mut this = Self::default();
		let mut pairs = Vec::new();

		for record in records {
			match record.into_pair() {
				Some((domain1, domain2)) => {
					let d1 = this.intern(domain1);
					let d2 = this.intern(domain2);
					pairs.push((d1, d2));
				}
				None => this.dropped += 1,
			}
		}

		let mut grouped = group_by(pairs);
		this.slots = vec![None; this.names.len()];
		for (position, &id) in grouped.keys.iter().enumerate() {
			let mut set: Vec<u32> = grouped
				.groups
				.remove(&id)
				.map(|s| s.into_iter().collect())
				.unwrap_or_default();
			set.sort_unstable();
			this.sets.push(set);
			this.slots[id as usize] = Some(position);
		}
		this.order = grouped.keys;

		this
	}

	pub fn from_edges(edges: &[NeighborEdge]) -> Self {
		Self::from_records(edges.iter().cloned().map(NeighborRecord::from))
	}

	fn intern(&mut self, name: Domain) -> u32 {
		if let Some(&id) = self.ids.get(&name) {
			return id;
		}
		let id = self.names.len() as u32;
		self.names.push(name.clone());
		self.ids.insert(name, id);
		id
	}

	/// Number of distinct `domain1` values (`N` of the pair scan)
	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Every interned domain, neighbors included
	pub fn domain_count(&self) -> usize {
		self.names.len()
	}

	/// Rows discarded for null or empty fields
	pub fn dropped(&self) -> usize {
		self.dropped
	}

	/// Name of the domain at scan position `position`
	pub fn domain_at(&self, position: usize) -> &str {
		self.name(self.order[position])
	}

	pub fn set_at(&self, position: usize) -> &[u32] {
		&self.sets[position]
	}

	pub fn name(&self, id: u32) -> &str {
		&self.names[id as usize]
	}

	pub fn id(&self, name: &str) -> Option<u32> {
		self.ids.get(name).copied()
	}

	/// Neighbor ids of `id`, empty when it never appears as `domain1`
	pub fn neighbors_of(&self, id: u32) -> &[u32] {
		match self.slots.get(id as usize).copied().flatten() {
			Some(position) => &self.sets[position],
			None => &[],
		}
	}

	/// Neighbor names of `name`, empty when unknown
	pub fn neighbors(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
		let ids = self.id(name).map(|id| self.neighbors_of(id)).unwrap_or(&[]);
		ids.iter().map(move |&id| self.name(id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(d1: Option<&str>, d2: Option<&str>, sim: Option<f32>) -> NeighborRecord {
		NeighborRecord {
			domain1: d1.map(String::from),
			domain2: d2.map(String::from),
			similarity: sim,
		}
	}

	#[test]
	fn group_by_keeps_encounter_order_and_dedups() {
		let grouped = group_by(vec![("b", 1), ("a", 2), ("b", 1), ("b", 3)]);
		assert_eq!(grouped.keys, vec!["b", "a"]);
		assert_eq!(grouped.groups[&"b"].len(), 2);
		assert_eq!(grouped.groups[&"a"].len(), 1);
	}

	#[test]
	fn neighbor_sets_drop_incomplete_rows() {
		let sets = NeighborSets::from_records(vec![
			record(Some("a"), Some("x"), Some(0.9)),
			record(Some("a"), None, Some(0.8)),
			record(Some(""), Some("y"), Some(0.8)),
			record(Some("b"), Some("y"), None),
			record(Some("b"), Some("z"), Some(f32::NAN)),
			record(Some("c"), Some("x"), Some(0.5)),
		]);

		assert_eq!(sets.len(), 2);
		assert_eq!(sets.dropped(), 4);
		assert_eq!(sets.domain_at(0), "a");
		assert_eq!(sets.domain_at(1), "c");
		assert_eq!(sets.neighbors("a").collect::<Vec<_>>(), vec!["x"]);
		assert_eq!(sets.neighbors("x").count(), 0);
		assert_eq!(sets.neighbors("missing").count(), 0);
	}

	#[test]
	fn neighbor_sets_are_sorted_and_unique() {
		let edges = vec![
			NeighborEdge::new("a", "z", 0.9),
			NeighborEdge::new("a", "y", 0.8),
			NeighborEdge::new("a", "z", 0.7),
		];
		let sets = NeighborSets::from_edges(&edges);
		let set = sets.set_at(0);
		assert_eq!(set.len(), 2);
		assert!(set.windows(2).all(|w| w[0] < w[1]));
	}

	#[test]
	fn partition_without_index_column_is_malformed() {
		let partition: SimilarityPartition =
			serde_json::from_str(r#"{"columns": ["a"], "values": [[1.0]]}"#).unwrap();
		let err = partition.validate(Path::new("p0.json")).unwrap_err();
		assert!(matches!(err, PipelineError::MalformedInput { .. }));
	}

	#[test]
	fn partition_with_only_bookkeeping_columns_is_malformed() {
		let partition: SimilarityPartition = serde_json::from_str(
			r#"{"domain_": ["a"], "columns": ["__null_dask_index__"], "values": [[0.0]]}"#,
		)
		.unwrap();
		assert!(partition.validate(Path::new("p0.json")).is_err());
	}

	#[test]
	fn partition_with_ragged_rows_is_malformed() {
		let partition: SimilarityPartition = serde_json::from_str(
			r#"{"domain_": ["a", "b"], "columns": ["a", "b"], "values": [[1.0, 0.2], [0.2]]}"#,
		)
		.unwrap();
		assert!(partition.validate(Path::new("p0.json")).is_err());
	}

	#[test]
	fn row_layout_is_widened_in_first_seen_column_order() {
		let value = serde_json::json!([
			{"domain_": "a", "b": 0.3, "c": 0.9},
			{"domain_": "b", "__null_dask_index__": 7, "a": 0.3, "c": null},
			{"c": 0.1, "domain_": "d"},
		]);

		let partition = SimilarityPartition::from_value(value, Path::new("p0.json")).unwrap();
		let (domains, comparable) = partition.validate(Path::new("p0.json")).unwrap();

		assert_eq!(domains, ["a", "b", "d"]);
		assert_eq!(partition.columns, ["b", "c", "a"]);
		assert_eq!(comparable, vec![0, 1, 2]);
		assert_eq!(partition.values[0], vec![Some(0.3), Some(0.9), None]);
		assert_eq!(partition.values[1], vec![None, None, Some(0.3)]);
		assert_eq!(partition.values[2], vec![None, Some(0.1), None]);
	}

	#[test]
	fn non_numeric_cells_are_malformed_in_both_layouts() {
		let columnar = serde_json::json!({"domain_": ["a"], "columns": ["b"], "values": [["high"]]});
		let rows = serde_json::json!([{"domain_": "a", "b": "high"}]);

		for value in [columnar, rows] {
			let err = SimilarityPartition::from_value(value, Path::new("p0.json")).unwrap_err();
			assert!(matches!(err, PipelineError::MalformedInput { .. }), "{err:?}");
		}
	}

	#[test]
	fn row_without_identifier_is_malformed() {
		let rows = serde_json::json!([{"domain_": "a", "b": 0.1}, {"b": 0.2}]);
		let err = SimilarityPartition::from_value(rows, Path::new("p0.json")).unwrap_err();
		assert!(matches!(err, PipelineError::MalformedInput { .. }));
	}
}
