//! Lens data points: the display elements that show metrics above a symbol.
//!
//! A lens resolves its document to an analysis unit, looks the symbol up in
//! that unit's cache and formats it with the current settings. Each lens owns
//! one reload subscriber; every reload bumps its generation so the editor
//! knows to ask for data again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use metrilens_broadcaster::Subscriber;
use metrilens_cache::{describe, details, DetailRow, MetricsCache, MetricsRecord};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::settings::SettingsStore;

/// Identifies the code element a lens is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LensDescriptor {
    /// Source document containing the symbol
    pub document: PathBuf,
    /// Fully-qualified display name, as written to the cache
    pub symbol: String,
}

impl LensDescriptor {
    pub fn new(document: impl Into<PathBuf>, symbol: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            symbol: symbol.into(),
        }
    }
}

/// Maps a document to the analysis unit whose cache holds its symbols
pub trait UnitResolver: Send + Sync {
    fn unit_for(&self, document: &Path) -> Option<String>;
}

/// Side table filled from the host's project/document enumeration
#[derive(Debug, Default)]
pub struct UnitTable {
    units: RwLock<HashMap<PathBuf, String>>,
}

impl UnitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, document: impl Into<PathBuf>, unit: impl Into<String>) {
        if let Ok(mut units) = self.units.write() {
            units.insert(document.into(), unit.into());
        }
    }

    pub fn unregister(&self, document: &Path) {
        if let Ok(mut units) = self.units.write() {
            units.remove(document);
        }
    }

    pub fn len(&self) -> usize {
        self.units.read().map(|units| units.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UnitResolver for UnitTable {
    fn unit_for(&self, document: &Path) -> Option<String> {
        self.units.read().ok()?.get(document).cloned()
    }
}

/// Resolves every document to the same unit (single-unit projects)
#[derive(Debug, Clone)]
pub struct StaticUnit(pub String);

impl UnitResolver for StaticUnit {
    fn unit_for(&self, _document: &Path) -> Option<String> {
        Some(self.0.clone())
    }
}

/// One-line description shown inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensData {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailHeader {
    pub display_name: &'static str,
    /// Pixels when > 1.0, otherwise a fraction of the remaining width
    pub width: f64,
}

/// Two-column table shown when a lens is expanded
#[derive(Debug, Clone, PartialEq)]
pub struct DetailsTable {
    pub headers: Vec<DetailHeader>,
    pub rows: Vec<DetailRow>,
}

/// Creates lenses sharing one cache, resolver and settings store
pub struct LensProvider {
    cache: MetricsCache,
    resolver: Arc<dyn UnitResolver>,
    settings: Arc<SettingsStore>,
    reload_socket_path: PathBuf,
}

impl LensProvider {
    pub fn new(
        cache: MetricsCache,
        resolver: Arc<dyn UnitResolver>,
        settings: Arc<SettingsStore>,
        reload_socket_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            cache,
            resolver,
            settings,
            reload_socket_path: reload_socket_path.as_ref().to_path_buf(),
        }
    }

    /// New lens for `descriptor`, subscribed to reloads
    pub fn create(self: &Arc<Self>, descriptor: LensDescriptor) -> MetricsLens {
        MetricsLens::new(Arc::clone(self), descriptor)
    }

    /// Cached record for the descriptor's symbol, or a placeholder
    pub fn lookup(&self, descriptor: &LensDescriptor) -> MetricsRecord {
        match self.resolver.unit_for(&descriptor.document) {
            Some(unit) => self.cache.lookup(&unit, &descriptor.symbol),
            None => {
                debug!("No analysis unit for {:?}", descriptor.document);
                MetricsRecord::placeholder(descriptor.symbol.as_str())
            }
        }
    }

    pub fn description_format(&self) -> String {
        self.settings.description_format()
    }
}

/// A display element bound to one symbol
pub struct MetricsLens {
    provider: Arc<LensProvider>,
    descriptor: LensDescriptor,
    generation: Arc<watch::Sender<u64>>,
    last_record: Mutex<Option<MetricsRecord>>,
    subscriber: Option<JoinHandle<u64>>,
}

impl MetricsLens {
    /// Construction never blocks or fails: the reload subscription starts in
    /// the background, and only when a tokio runtime is available.
    pub fn new(provider: Arc<LensProvider>, descriptor: LensDescriptor) -> Self {
        let (sender, _) = watch::channel(0u64);
        let generation = Arc::new(sender);

        let subscriber = match Handle::try_current() {
            Ok(_) => {
                let generation = Arc::clone(&generation);
                Some(
                    Subscriber::new(&provider.reload_socket_path).spawn(move || {
                        generation.send_modify(|g| *g += 1);
                    }),
                )
            }
            Err(_) => {
                warn!("No async runtime, lens for {} will not auto-refresh", descriptor.symbol);
                None
            }
        };

        Self {
            provider,
            descriptor,
            generation,
            last_record: Mutex::new(None),
            subscriber,
        }
    }

    pub fn descriptor(&self) -> &LensDescriptor {
        &self.descriptor
    }

    /// Number of invalidations received so far
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that changes on every invalidation
    pub fn invalidated(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Fetch fresh metrics and format them with the current settings
    pub fn data(&self) -> LensData {
        let record = self.provider.lookup(&self.descriptor);
        let description = describe(&record, &self.provider.description_format());

        if let Ok(mut last) = self.last_record.lock() {
            *last = Some(record);
        }

        LensData { description }
    }

    /// Details of the record last fetched by [`data`](Self::data)
    pub fn details(&self) -> DetailsTable {
        let last = self.last_record.lock().ok().and_then(|last| last.clone());
        let record = last.unwrap_or_else(|| self.provider.lookup(&self.descriptor));

        DetailsTable {
            headers: vec![
                DetailHeader {
                    display_name: "Metric",
                    width: 150.0,
                },
                DetailHeader {
                    display_name: "Value",
                    width: 1.0,
                },
            ],
            rows: details(&record),
        }
    }
}

impl Drop for MetricsLens {
    fn drop(&mut self) {
        if let Some(task) = self.subscriber.take() {
            task.abort();
        }
    }
}
