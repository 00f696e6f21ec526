//! Recompute trigger: analyze every unit, rewrite its cache, then broadcast
//! one reload.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use metrilens_broadcaster::ReloadHub;
use metrilens_cache::{MetricsCache, MetricsNode};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// A compilable grouping (e.g. one project) with its own cache file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisUnit {
    pub name: String,
    /// Input handed to the analyzer (project file, precomputed tree, ...)
    pub source: PathBuf,
}

impl AnalysisUnit {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Boundary to the static-analysis engine
pub trait MetricsAnalyzer: Send + Sync {
    /// Compute the metrics tree of `unit`. `Ok(None)` means the unit is not
    /// compilable and is skipped.
    fn analyze(&self, unit: &AnalysisUnit) -> Result<Option<MetricsNode>>;
}

/// Reads a metrics tree the engine already wrote as JSON at `unit.source`
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeFileAnalyzer;

impl MetricsAnalyzer for TreeFileAnalyzer {
    fn analyze(&self, unit: &AnalysisUnit) -> Result<Option<MetricsNode>> {
        let file = File::open(&unit.source)
            .with_context(|| format!("Failed to open metrics tree {:?}", unit.source))?;
        let tree = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse metrics tree {:?}", unit.source))?;
        Ok(Some(tree))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Pass ran; `saved` of `total` units were written
    Completed { saved: usize, total: usize },
    /// Another pass was already running, nothing was done
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitStatus {
    Saved,
    NotCompilable,
    Failed,
}

/// Runs recompute passes, at most one at a time
pub struct Recomputer {
    cache: MetricsCache,
    hub: Arc<ReloadHub>,
    analyzer: Arc<dyn MetricsAnalyzer>,
    in_progress: Mutex<()>,
}

impl Recomputer {
    pub fn new(cache: MetricsCache, hub: Arc<ReloadHub>, analyzer: Arc<dyn MetricsAnalyzer>) -> Self {
        Self {
            cache,
            hub,
            analyzer,
            in_progress: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    /// Recompute every unit, then broadcast the reload token once.
    ///
    /// A trigger arriving while a pass runs is dropped, not queued.
    pub async fn recompute(&self, units: &[AnalysisUnit]) -> RecomputeOutcome {
        let Ok(_guard) = self.in_progress.try_lock() else {
            info!("Recompute already running, skipping trigger");
            return RecomputeOutcome::Skipped;
        };

        info!(">>> Analyzing {} units >>>", units.len());

        let mut saved = 0;
        for unit in units {
            if self.recompute_unit(unit).await == UnitStatus::Saved {
                saved += 1;
            }
        }

        info!(
            "<<< Analyzing completed {} ({}/{} units saved) <<<",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            saved,
            units.len()
        );

        let delivered = self.hub.broadcast_reload().await;
        debug!("Reload sent to {} subscribers", delivered);

        RecomputeOutcome::Completed {
            saved,
            total: units.len(),
        }
    }

    async fn recompute_unit(&self, unit: &AnalysisUnit) -> UnitStatus {
        info!("--- Analyzing unit: {} ---", unit.name);

        let analyzer = Arc::clone(&self.analyzer);
        let cache = self.cache.clone();
        let owned_unit = unit.clone();

        // Analysis and file I/O are blocking
        let result = tokio::task::spawn_blocking(move || -> Result<UnitStatus> {
            match analyzer.analyze(&owned_unit)? {
                Some(tree) if cache.save_unit(&owned_unit.name, &tree) => Ok(UnitStatus::Saved),
                Some(_) => Ok(UnitStatus::Failed),
                None => Ok(UnitStatus::NotCompilable),
            }
        })
        .await;

        match result {
            Ok(Ok(UnitStatus::Failed)) => {
                warn!("Failed to write metrics cache for unit {}", unit.name);
                UnitStatus::Failed
            }
            Ok(Ok(UnitStatus::NotCompilable)) => {
                debug!("Skipping non-compilable unit {}", unit.name);
                UnitStatus::NotCompilable
            }
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!("Failed to analyze unit {}: {:#}", unit.name, e);
                UnitStatus::Failed
            }
            Err(e) => {
                error!("Analysis task for unit {} failed: {}", unit.name, e);
                UnitStatus::Failed
            }
        }
    }
}
