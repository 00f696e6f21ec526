//! Subscriber side of the reload channel.
//!
//! One subscriber per display element: it connects once, then raises an
//! invalidation for every reload line it reads. A failed connect, read error
//! or end of stream ends it for good; a new element gets a new subscriber.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::Notification;

pub struct Subscriber {
    socket_path: PathBuf,
}

impl Subscriber {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Connect and read until the channel ends, calling `on_invalidate` once
    /// per reload line. Returns how many invalidations were raised.
    pub async fn listen<F>(self, mut on_invalidate: F) -> u64
    where
        F: FnMut() + Send,
    {
        let mut raised = 0;

        match self.connect_and_process(&mut on_invalidate, &mut raised).await {
            Ok(()) => {
                info!("Reload channel closed after {} invalidations", raised);
            }
            Err(e) => {
                warn!("Reload subscriber stopped: {:#}", e);
            }
        }

        raised
    }

    /// Run [`listen`](Self::listen) as a detached background task
    pub fn spawn<F>(self, on_invalidate: F) -> JoinHandle<u64>
    where
        F: FnMut() + Send + 'static,
    {
        tokio::spawn(self.listen(on_invalidate))
    }

    async fn connect_and_process<F>(&self, on_invalidate: &mut F, raised: &mut u64) -> Result<()>
    where
        F: FnMut() + Send,
    {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| format!("Failed to connect to reload socket {:?}", self.socket_path))?;

        debug!("Connected to reload socket {:?}", self.socket_path);

        let mut lines = BufReader::new(stream).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from reload socket")?
        {
            match Notification::parse(&line) {
                Some(Notification::Reload) => {
                    *raised += 1;
                    on_invalidate();
                }
                None => debug!("Ignoring unknown notification: {:?}", line),
            }
        }

        Ok(())
    }
}
