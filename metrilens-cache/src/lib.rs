//! Metrilens metrics cache
//!
//! Persists per-symbol code metrics for one analysis unit as a JSON array
//! under `<project-root>/.Metrics/<unit>.json` and looks records up by their
//! fully-qualified display name.
//!
//! ## Features
//!
//! - **Writer**: pre-order flattening of a metrics tree, whole-file replace
//! - **Lookup**: streaming first-match search that never fails
//! - **Format**: placeholder substitution for the editor description

pub mod cache;
pub mod error;
pub mod format;
pub mod lookup;
pub mod models;
pub mod writer;

// Re-export main types
pub use cache::MetricsCache;
pub use error::{CacheError, Result};
pub use format::{describe, details, DetailRow, DEFAULT_DESCRIPTION_FORMAT};
pub use lookup::{find, try_find};
pub use models::{MetricsNode, MetricsRecord, NodeMetrics};
pub use writer::{flatten, save};
