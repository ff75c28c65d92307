//! Similarity partition discovery

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::PARTITION_EXTENSIONS;
use crate::error::{PipelineError, Result};
use crate::ui;

/// First run of decimal digits in the file name, if any
pub fn sequence_number(path: &Path) -> Option<u64> {
	let name = path.file_name()?.to_str()?;
	let start = name.find(|c: char| c.is_ascii_digit())?;
	let digits: String = name[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
	digits.parse().ok()
}

fn compare_partitions(a: &Path, b: &Path) -> Ordering {
	match (sequence_number(a), sequence_number(b)) {
		(Some(x), Some(y)) => x.cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
	.then_with(|| a.file_name().cmp(&b.file_name()))
}

fn is_partition(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| PARTITION_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// List partition files directly inside `folder`, ordered by embedded
/// sequence number. A missing folder yields no partitions; an unreadable one
/// is an error.
pub fn list_partitions(folder: &Path) -> Result<Vec<PathBuf>> {
	if !folder.is_dir() {
		ui::warn(&format!("Partition folder not found: {}", folder.display()));
		return Ok(Vec::new());
	}

	let mut files = Vec::new();
	for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
		let entry = entry.map_err(|err| PipelineError::Io {
			path: err.path().unwrap_or(folder).to_path_buf(),
			source: err.into(),
		})?;
		if entry.file_type().is_file() && is_partition(entry.path()) {
			files.push(entry.into_path());
		}
	}

	files.sort_by(|a, b| compare_partitions(a, b));
	ui::debug(&format!("Found {} partition files in {}", files.len(), folder.display()));
	Ok(files)
}
