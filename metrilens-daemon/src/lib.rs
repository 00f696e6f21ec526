//! Metrilens daemon library
//!
//! Wires the metrics cache and the reload channel into lenses, the recompute
//! trigger and the control socket. Re-exported for the binary and for
//! integration testing.

pub mod config;
pub mod ipc;
pub mod lens;
pub mod recompute;
pub mod settings;
pub mod version;
