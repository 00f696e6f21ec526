//! Reload notification channel for metrilens display elements
//!
//! This crate provides a Unix socket server that tells every connected
//! subscriber when cached metrics (or display settings) changed, plus the
//! subscriber that listens for it.
//!
//! # Features
//!
//! - Unix domain socket server (`metrilens_reload.sock`)
//! - Newline-delimited plain-text protocol; the only token is `Reload`
//! - Any number of concurrent subscribers
//! - Dead subscribers pruned on the first failed write
//!
//! # Example Usage
//!
//! ```no_run
//! use metrilens_broadcaster::{ReloadHub, Subscriber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = ReloadHub::new("/tmp/metrilens_reload.sock");
//!     hub.start().await?;
//!
//!     // One subscriber per display element
//!     Subscriber::new("/tmp/metrilens_reload.sock").spawn(|| {
//!         println!("metrics invalidated");
//!     });
//!
//!     // After the cache was rewritten
//!     hub.broadcast_reload().await;
//!
//!     hub.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod error;
pub mod events;
pub mod subscriber;

// Re-exports
pub use broadcaster::ReloadHub;
pub use error::{BroadcasterError, Result};
pub use events::{Notification, RELOAD_TOKEN};
pub use subscriber::Subscriber;
