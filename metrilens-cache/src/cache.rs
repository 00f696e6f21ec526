//! Per-project cache facade over the writer and lookup

use std::path::{Path, PathBuf};

use crate::lookup;
use crate::models::{MetricsNode, MetricsRecord};
use crate::writer;

/// Metrics cache rooted at a project directory (`<root>/.Metrics/`)
#[derive(Debug, Clone)]
pub struct MetricsCache {
    project_root: PathBuf,
}

impl MetricsCache {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Cache directory; may not exist before the first save
    pub fn cache_dir(&self) -> PathBuf {
        metrilens_paths::cache_dir(&self.project_root)
    }

    /// Cache file for `unit`, or `None` if the unit name cannot form a path
    pub fn unit_path(&self, unit: &str) -> Option<PathBuf> {
        match metrilens_paths::unit_cache_path(&self.project_root, unit) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Flatten and persist `tree` as the cache of `unit`
    pub fn save_unit(&self, unit: &str, tree: &MetricsNode) -> bool {
        self.unit_path(unit)
            .is_some_and(|path| writer::save(tree, &path))
    }

    /// Look up `symbol` in the cache of `unit`; never fails
    pub fn lookup(&self, unit: &str, symbol: &str) -> MetricsRecord {
        match self.unit_path(unit) {
            Some(path) => lookup::find(&path, symbol),
            None => MetricsRecord::placeholder(symbol),
        }
    }

    /// Like [`lookup`](Self::lookup), but `None` on a miss instead of a
    /// placeholder, so a cached all-zero record stays distinguishable.
    pub fn find_record(&self, unit: &str, symbol: &str) -> Option<MetricsRecord> {
        let path = self.unit_path(unit)?;
        match lookup::try_find(&path, symbol) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Failed to read metrics cache {}: {}", path.display(), e);
                None
            }
        }
    }
}
