use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use crate::error::Result;
use crate::events::Notification;

/// Subscriber connection held by the hub
pub struct Client {
    id: u64,
    stream: UnixStream,
}

impl Client {
    pub fn new(id: u64, stream: UnixStream) -> Self {
        Self { id, stream }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Write one notification line
    pub async fn send(&mut self, notification: Notification) -> Result<()> {
        self.stream.write_all(notification.to_line().as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Registry of live subscriber connections.
///
/// Sole owner of every connection; dropping a `Client` closes it.
pub struct ClientManager {
    clients: Arc<Mutex<Vec<Client>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register an accepted connection
    pub async fn add_stream(&self, stream: UnixStream) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut clients = self.clients.lock().await;
        clients.push(Client::new(id, stream));
        tracing::info!("Subscriber {} connected. Total subscribers: {}", id, clients.len());
        id
    }

    /// Send `notification` to every client, dropping the ones whose write fails.
    ///
    /// The registry stays locked for the whole pass. Returns the number of
    /// clients the message was written to.
    pub async fn broadcast(&self, notification: Notification) -> usize {
        let mut clients = self.clients.lock().await;
        let mut dead_indices = Vec::new();

        for (idx, client) in clients.iter_mut().enumerate() {
            if let Err(e) = client.send(notification).await {
                tracing::debug!("Failed to send to subscriber {}: {}", client.id(), e);
                dead_indices.push(idx);
            }
        }

        let delivered = clients.len() - dead_indices.len();

        // Remove dead clients in reverse order
        for idx in dead_indices.iter().rev() {
            let client = clients.remove(*idx);
            tracing::info!(
                "Removed dead subscriber {}. Remaining: {}",
                client.id(),
                clients.len()
            );
        }

        delivered
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Drop every connection
    pub async fn clear(&self) {
        self.clients.lock().await.clear();
    }
}

impl Clone for ClientManager {
    /// Shares the same registry
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
