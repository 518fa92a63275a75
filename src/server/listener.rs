//! Tokio TCP listener driving one [`ServerConnection`] per peer.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use super::connection::ServerConnection;
use super::engine::Server;
use crate::codec::Buffer;
use crate::core::constants::DEFAULT_PORT;
use crate::core::TransportError;
use crate::transport::write_error;

/// Errors raised by the tokio server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// I/O error on a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The protocol core rejected traffic.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

/// A listening server: accepts connections and spawns one transport
/// task per peer, all sharing one [`Server`].
pub struct TcpServer {
    local_addr: SocketAddr,
    server: Arc<Mutex<Server>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TcpServer {
    /// Bind and start accepting connections.
    pub async fn bind(config: ServerConfig, server: Server) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening");

        let server = Arc::new(Mutex::new(server));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let accept_server = server.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            let server = accept_server.clone();
                            tokio::spawn(async move {
                                drive_connection(stream, server).await;
                                debug!(%peer, "connection finished");
                            });
                        }
                        Err(err) => {
                            warn!(%err, "accept failed");
                        }
                    },
                    _ = &mut shutdown_rx => {
                        debug!("listener shutting down");
                        return;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            server,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared server state.
    pub fn server(&self) -> Arc<Mutex<Server>> {
        self.server.clone()
    }

    /// Stop accepting connections.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Pump one peer's socket through a [`ServerConnection`] until EOF or
/// a fatal error.
async fn drive_connection(mut stream: TcpStream, server: Arc<Mutex<Server>>) {
    let _ = stream.set_nodelay(true);
    let mut conn = ServerConnection::new();
    let mut read_buf = vec![0u8; 64 * 1024];

    loop {
        let n = match stream.read(&mut read_buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        let received = {
            let mut srv = server.lock().await;
            conn.receive(&mut srv, &read_buf[..n])
        };
        match received {
            Ok(()) => {
                let out = conn.take_output();
                if !out.is_empty() && stream.write_all(&out).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(%err, "fatal transport error; closing connection");
                // Flush whatever was produced, then the ERR frame.
                let mut out = Buffer::from(conn.take_output());
                write_error(&mut out, err.status(), &err.to_string());
                let _ = stream.write_all(&out.take_all()).await;
                break;
            }
        }
    }

    let mut srv = server.lock().await;
    conn.teardown(&mut srv);
}
