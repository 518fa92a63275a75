//! Tokio TCP driver for [`ClientConnection`].

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::core::constants::DEFAULT_PORT;
use crate::core::{StatusCode, TransportError};
use crate::services::{
    AttributeId, ReadRequest, ReadValueId, ServiceMessage, TimestampsToReturn, WriteRequest,
    WriteValue,
};
use crate::transport::write_error;
use crate::types::{DataValue, DateTime, NodeId};

/// Errors surfaced by the tokio client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to reach or handshake with the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The protocol core rejected traffic.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a bad status.
    #[error("service fault: {0}")]
    Fault(StatusCode),

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The client is disconnected.
    #[error("client disconnected")]
    Disconnected,

    /// The server answered with a different service than requested.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to.
    pub server_addr: SocketAddr,

    /// Endpoint URL announced in HEL and CreateSession.
    pub endpoint_url: String,

    /// Session name announced to the server.
    pub session_name: String,

    /// Deadline for connect + handshake + session bring-up.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            endpoint_url: format!("opc.tcp://127.0.0.1:{DEFAULT_PORT}/"),
            session_name: "opcua-stack client".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for a [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server address.
    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.config.server_addr = addr;
        self
    }

    /// Set the endpoint URL.
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    /// Set the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

enum Command {
    Request {
        msg: ServiceMessage,
        reply: oneshot::Sender<Result<ServiceMessage, StatusCode>>,
    },
    Shutdown,
}

/// A connected client with an activated session.
///
/// Cheap to clone; all clones talk to the same connection task.
#[derive(Clone)]
pub struct Client {
    cmd_tx: mpsc::Sender<Command>,
}

impl Client {
    /// Connect, handshake, open a secure channel and bring up an
    /// activated session.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.server_addr),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true)?;

        let mut conn = ClientConnection::new(&config.endpoint_url);
        conn.on_connected()?;
        let channel = conn.open_channel()?;

        let (established_tx, established_rx) = oneshot::channel();
        let session = conn.create_session(
            channel,
            &config.session_name,
            Box::new(move |result| {
                let _ = established_tx.send(result.map(|_| ()));
            }),
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        tokio::spawn(io_task(stream, conn, session, cmd_rx));

        match tokio::time::timeout(config.connect_timeout, established_rx).await {
            Ok(Ok(Ok(()))) => Ok(Self { cmd_tx }),
            Ok(Ok(Err(status))) => Err(ClientError::Fault(status)),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Issue one service request and await its response.
    pub async fn request(&self, msg: ServiceMessage) -> Result<ServiceMessage, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request {
                msg,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::Disconnected)?;
        let response = reply_rx.await.map_err(|_| ClientError::Disconnected)?;
        response.map_err(ClientError::Fault)
    }

    /// Read the Value attribute of the given nodes.
    pub async fn read_values(&self, nodes: &[NodeId]) -> Result<Vec<DataValue>, ClientError> {
        let msg = ServiceMessage::ReadRequest(ReadRequest {
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: nodes
                .iter()
                .map(|n| ReadValueId::new(n.clone(), AttributeId::Value))
                .collect(),
            ..Default::default()
        });
        match self.request(msg).await? {
            ServiceMessage::ReadResponse(resp) => {
                let result = resp.response_header.service_result;
                if result.is_bad() {
                    return Err(ClientError::Fault(result));
                }
                Ok(resp.results)
            }
            _ => Err(ClientError::UnexpectedResponse("expected ReadResponse")),
        }
    }

    /// Write the Value attribute of the given nodes.
    pub async fn write_values(
        &self,
        values: Vec<(NodeId, DataValue)>,
    ) -> Result<Vec<StatusCode>, ClientError> {
        let msg = ServiceMessage::WriteRequest(WriteRequest {
            nodes_to_write: values
                .into_iter()
                .map(|(node, value)| WriteValue::new(node, AttributeId::Value, value))
                .collect(),
            ..Default::default()
        });
        match self.request(msg).await? {
            ServiceMessage::WriteResponse(resp) => {
                let result = resp.response_header.service_result;
                if result.is_bad() {
                    return Err(ClientError::Fault(result));
                }
                Ok(resp.results)
            }
            _ => Err(ClientError::UnexpectedResponse("expected WriteResponse")),
        }
    }

    /// Gracefully shut the connection down.
    pub async fn disconnect(self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }
}

async fn flush(conn: &mut ClientConnection, stream: &mut TcpStream) -> std::io::Result<()> {
    let bytes = conn.take_output();
    if !bytes.is_empty() {
        stream.write_all(&bytes).await?;
    }
    Ok(())
}

async fn io_task(
    mut stream: TcpStream,
    mut conn: ClientConnection,
    session: usize,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    // Push the HEL (and anything else already queued).
    if flush(&mut conn, &mut stream).await.is_err() {
        conn.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
        return;
    }

    let mut read_buf = vec![0u8; 64 * 1024];
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => match read {
                Ok(0) | Err(_) => {
                    debug!("server closed the connection");
                    conn.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
                    return;
                }
                Ok(n) => {
                    if let Err(err) = conn.receive(&read_buf[..n]) {
                        warn!(%err, "fatal transport error");
                        let mut out = crate::codec::Buffer::new();
                        write_error(&mut out, err.status(), &err.to_string());
                        let _ = stream.write_all(&out.take_all()).await;
                        conn.fail_all(err.status());
                        return;
                    }
                    if flush(&mut conn, &mut stream).await.is_err() {
                        conn.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
                        return;
                    }
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Request { msg, reply }) => {
                    conn.send(session, msg, Box::new(move |result| {
                        let _ = reply.send(result);
                    }));
                    if flush(&mut conn, &mut stream).await.is_err() {
                        conn.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
                        return;
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = conn.close_channel(0);
                    let _ = flush(&mut conn, &mut stream).await;
                    conn.close();
                    return;
                }
            },
            _ = tick.tick() => {
                conn.poll(DateTime::now());
                if flush(&mut conn, &mut stream).await.is_err() {
                    conn.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
                    return;
                }
            }
        }
    }
}
