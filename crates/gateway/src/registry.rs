//! Live client connections, keyed by id.

use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        sync::Mutex as AsyncMutex,
    },
    tracing::debug,
};

#[cfg(feature = "metrics")]
use courier_metrics::{broadcast as broadcast_metrics, gauge};

use crate::{Error, Result};

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write half of one accepted socket.
pub struct ClientConnection {
    id: ClientId,
    addr: SocketAddr,
    writer: AsyncMutex<BoxedWriter>,
    alive: AtomicBool,
    write_timeout: Duration,
}

impl ClientConnection {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Write and flush `bytes`, bounded by the write timeout.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::ClientClosed { client: self.id });
        }
        let mut writer = self.writer.lock().await;
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(Error::Send {
                client: self.id,
                source,
            }),
            Err(_) => Err(Error::SendTimeout {
                client: self.id,
                timeout: self.write_timeout,
            }),
        }
    }

    /// Shut the write half down. Only the first call does anything.
    pub async fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        let shutdown = async {
            let mut writer = self.writer.lock().await;
            writer.shutdown().await
        };
        match tokio::time::timeout(self.write_timeout, shutdown).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => debug!(client_id = %self.id, error = %e, "client shutdown failed"),
            Err(_) => debug!(client_id = %self.id, "client shutdown timed out"),
        }
    }
}

/// Arena of connected clients behind a single mutex.
///
/// The lock is never held across an `.await`: removal happens under the lock
/// and closing after it, so exactly one caller closes a given connection.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, Arc<ClientConnection>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        addr: SocketAddr,
        writer: BoxedWriter,
        write_timeout: Duration,
    ) -> Arc<ClientConnection> {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let conn = Arc::new(ClientConnection {
            id,
            addr,
            writer: AsyncMutex::new(writer),
            alive: AtomicBool::new(true),
            write_timeout,
        });
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.insert(id, Arc::clone(&conn));
        #[cfg(feature = "metrics")]
        gauge!(broadcast_metrics::CLIENTS_CONNECTED).set(clients.len() as f64);
        conn
    }

    /// Remove and close `id`. Returns false if it was already gone.
    pub async fn deregister(&self, id: ClientId) -> bool {
        let removed = {
            let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
            let removed = clients.remove(&id);
            #[cfg(feature = "metrics")]
            gauge!(broadcast_metrics::CLIENTS_CONNECTED).set(clients.len() as f64);
            removed
        };
        match removed {
            Some(conn) => {
                conn.close().await;
                true
            },
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and close every client.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<ClientConnection>> = {
            let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
            clients.drain().map(|(_, conn)| conn).collect()
        };
        #[cfg(feature = "metrics")]
        gauge!(broadcast_metrics::CLIENTS_CONNECTED).set(0.0);
        futures::future::join_all(drained.iter().map(|conn| conn.close())).await;
        drained.len()
    }
}
