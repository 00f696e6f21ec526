use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::client::ClientManager;
use crate::error::{BroadcasterError, Result};
use crate::events::Notification;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Fans reload notifications out to every connected subscriber
pub struct ReloadHub {
    socket_path: PathBuf,
    client_manager: ClientManager,
    accept_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    running: Arc<RwLock<bool>>,
}

impl ReloadHub {
    /// Create a hub for `socket_path`; nothing is bound until [`start`](Self::start)
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            client_manager: ClientManager::new(),
            accept_task: Arc::new(Mutex::new(None)),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and start accepting subscribers.
    ///
    /// Idempotent: calling it on a running hub does nothing.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            tracing::debug!("Reload hub already running on {:?}", self.socket_path);
            return Ok(());
        }

        if let Some(parent) = self.socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Remove stale socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        metrilens_paths::secure_socket_permissions(&self.socket_path)
            .map_err(|e| BroadcasterError::SocketPath(format!("{e:#}")))?;

        tracing::info!("Reload hub started on {:?} (permissions: 0600)", self.socket_path);

        let client_manager = self.client_manager.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        client_manager.add_stream(stream).await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept subscriber: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                }
            }
        });

        *self.accept_task.lock().await = Some(task);
        *running = true;

        Ok(())
    }

    /// Stop accepting, drop every subscriber and remove the socket file
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(BroadcasterError::NotStarted);
        }
        *running = false;

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }

        self.client_manager.clear().await;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        tracing::info!("Reload hub stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Write `notification` as one line to every live subscriber.
    ///
    /// Fire-and-forget: subscribers whose write fails are pruned, not retried.
    /// Returns how many subscribers the line was written to.
    pub async fn broadcast(&self, notification: Notification) -> usize {
        let delivered = self.client_manager.broadcast(notification).await;
        tracing::debug!("Broadcast {} to {} subscribers", notification, delivered);
        delivered
    }

    /// Tell every subscriber to re-fetch
    pub async fn broadcast_reload(&self) -> usize {
        self.broadcast(Notification::Reload).await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.client_manager.client_count().await
    }
}

impl Drop for ReloadHub {
    fn drop(&mut self) {
        if let Ok(mut task) = self.accept_task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }

        // Only clean up a socket this hub bound
        let owned = self.running.try_read().map(|r| *r).unwrap_or(false);
        if owned && self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
