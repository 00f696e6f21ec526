//! Cache writer: flattens a metrics tree and persists it as a JSON array

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};
use crate::models::{MetricsNode, MetricsRecord};

/// Flatten a tree in pre-order: node first, then each child subtree in order.
pub fn flatten(tree: &MetricsNode) -> Vec<MetricsRecord> {
    let mut records = Vec::with_capacity(tree.node_count());
    let mut stack = vec![tree];

    while let Some(node) = stack.pop() {
        records.push(node.to_record());
        // Reverse so the first child is popped next
        stack.extend(node.children.iter().rev());
    }

    records
}

/// Persist `tree` to `file_path`, replacing any previous content.
///
/// Best effort: returns `false` on an empty path or any I/O or serialization
/// failure, never panics. A failed overwrite may lose the previous snapshot.
pub fn save(tree: &MetricsNode, file_path: &Path) -> bool {
    match try_save(tree, file_path) {
        Ok(count) => {
            tracing::debug!("Saved {} metrics records to {}", count, file_path.display());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to save metrics cache {}: {}", file_path.display(), e);
            false
        }
    }
}

/// Fallible version of [`save`]; returns the number of records written.
pub fn try_save(tree: &MetricsNode, file_path: &Path) -> Result<usize> {
    if file_path.as_os_str().is_empty() {
        return Err(CacheError::EmptyPath);
    }

    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let records = flatten(tree);
    let temp_path = temp_path_for(file_path)?;

    if let Err(e) = write_records(&temp_path, &records) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // Readers only ever see the old or the new complete file
    fs::rename(&temp_path, file_path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })?;

    Ok(records.len())
}

fn write_records(path: &Path, records: &[MetricsRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn temp_path_for(file_path: &Path) -> Result<PathBuf> {
    let file_name = file_path
        .file_name()
        .ok_or_else(|| CacheError::InvalidPath(file_path.display().to_string()))?;

    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    Ok(file_path.with_file_name(temp_name))
}
