//! Parquet similarity partitions and neighbor tables

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float32Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::config::{IGNORED_COLUMNS, INDEX_COLUMN};
use crate::core::{Domain, NeighborEdge, NeighborRecord, SimilarityPartition};
use crate::error::{PipelineError, Result};

use super::artifact::{codec, create_parent};

const DOMAIN1: &str = "domain1";
const DOMAIN2: &str = "domain2";
const SIMILARITY: &str = "similarity";

fn read_batches(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
	let file = File::open(path).map_err(|source| PipelineError::Io {
		path: path.to_path_buf(),
		source,
	})?;

	let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| codec(path, e))?;
	let schema = builder.schema().clone();
	let batches = builder
		.build()
		.map_err(|e| codec(path, e))?
		.collect::<std::result::Result<Vec<_>, _>>()
		.map_err(|e| codec(path, e))?;

	Ok((schema, batches))
}

fn text_column(column: &ArrayRef, name: &str, path: &Path) -> Result<Vec<Option<String>>> {
	let text = cast(column.as_ref(), &DataType::Utf8).map_err(|e| {
		PipelineError::malformed(path, format!("column '{}' is not text: {}", name, e))
	})?;
	let text = text
		.as_any()
		.downcast_ref::<StringArray>()
		.ok_or_else(|| PipelineError::malformed(path, format!("column '{}' is not text", name)))?;

	Ok(text.iter().map(|v| v.map(str::to_owned)).collect())
}

fn similarity_column(column: &ArrayRef, name: &str, path: &Path) -> Result<Vec<Option<f32>>> {
	let data_type = column.data_type();
	if !data_type.is_numeric() && *data_type != DataType::Null {
		return Err(PipelineError::malformed(
			path,
			format!("column '{}' has non-numeric type {}", name, data_type),
		));
	}

	let floats = cast(column.as_ref(), &DataType::Float32)
		.map_err(|e| PipelineError::malformed(path, format!("column '{}': {}", name, e)))?;
	let floats = floats
		.as_any()
		.downcast_ref::<Float32Array>()
		.ok_or_else(|| PipelineError::malformed(path, format!("column '{}' is not numeric", name)))?;

	Ok(floats.iter().collect())
}

/// Read a wide similarity partition: a `domain_` text column plus one numeric
/// column per compared domain. Any decode failure is a malformed partition.
pub fn read_partition(path: &Path) -> Result<SimilarityPartition> {
	let (schema, batches) = read_batches(path).map_err(|err| match err {
		PipelineError::Codec { path, reason } => PipelineError::MalformedInput { path, reason },
		other => other,
	})?;

	let Some((index, _)) = schema.column_with_name(INDEX_COLUMN) else {
		return Err(PipelineError::malformed(
			path,
			format!("missing '{}' identifier column", INDEX_COLUMN),
		));
	};

	let compared: Vec<(usize, Domain)> = schema
		.fields()
		.iter()
		.enumerate()
		.filter(|(_, field)| !IGNORED_COLUMNS.contains(&field.name().as_str()))
		.map(|(i, field)| (i, field.name().clone()))
		.collect();

	let mut domains = Vec::new();
	let mut values: Vec<Vec<Option<f32>>> = Vec::new();

	for batch in &batches {
		for (row, domain) in text_column(batch.column(index), INDEX_COLUMN, path)?
			.into_iter()
			.enumerate()
		{
			let domain = domain.ok_or_else(|| {
				let row = domains.len() + row;
				PipelineError::malformed(path, format!("null '{}' in row {}", INDEX_COLUMN, row))
			})?;
			domains.push(domain);
		}

		let data = compared
			.iter()
			.map(|(i, name)| similarity_column(batch.column(*i), name, path))
			.collect::<Result<Vec<_>>>()?;
		values.extend((0..batch.num_rows()).map(|row| data.iter().map(|col| col[row]).collect()));
	}

	Ok(SimilarityPartition {
		domains: Some(domains),
		columns: compared.into_iter().map(|(_, name)| name).collect(),
		values,
	})
}

/// Write the neighbor table with `domain1`, `domain2` and `similarity` columns
pub fn write_neighbors(path: &Path, edges: &[NeighborEdge]) -> Result<()> {
	create_parent(path)?;

	let schema = Arc::new(Schema::new(vec![
		Field::new(DOMAIN1, DataType::Utf8, false),
		Field::new(DOMAIN2, DataType::Utf8, false),
		Field::new(SIMILARITY, DataType::Float32, false),
	]));
	let columns: Vec<ArrayRef> = vec![
		Arc::new(StringArray::from_iter_values(edges.iter().map(|e| e.domain1.as_str()))),
		Arc::new(StringArray::from_iter_values(edges.iter().map(|e| e.domain2.as_str()))),
		Arc::new(Float32Array::from_iter_values(edges.iter().map(|e| e.similarity))),
	];
	let batch = RecordBatch::try_new(schema.clone(), columns).map_err(|e| codec(path, e))?;

	let file = File::create(path).map_err(|source| PipelineError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	let mut writer = ArrowWriter::try_new(file, schema, None).map_err(|e| codec(path, e))?;
	writer.write(&batch).map_err(|e| codec(path, e))?;
	writer.close().map_err(|e| codec(path, e))?;
	Ok(())
}

/// Read a neighbor table; nulls survive as `None` for the caller to drop
pub fn read_neighbors(path: &Path) -> Result<Vec<NeighborRecord>> {
	let (schema, batches) = read_batches(path)?;
	let position = |name: &str| {
		schema
			.index_of(name)
			.map_err(|_| PipelineError::malformed(path, format!("missing '{}' column", name)))
	};
	let (d1, d2, sim) = (position(DOMAIN1)?, position(DOMAIN2)?, position(SIMILARITY)?);

	let mut records = Vec::new();
	for batch in &batches {
		let domain1 = text_column(batch.column(d1), DOMAIN1, path)?;
		let domain2 = text_column(batch.column(d2), DOMAIN2, path)?;
		let similarity = similarity_column(batch.column(sim), SIMILARITY, path)?;

		records.extend(domain1.into_iter().zip(domain2).zip(similarity).map(
			|((domain1, domain2), similarity)| NeighborRecord {
				domain1,
				domain2,
				similarity,
			},
		));
	}

	Ok(records)
}
