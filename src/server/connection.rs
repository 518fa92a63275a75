//! The per-peer sans-io server connection.

use std::collections::HashMap;

use tracing::debug;

use super::engine::Server;
use crate::codec::{BinaryDecode, BinaryEncode, Buffer};
use crate::core::{CodecError, StatusCode, TransportError};
use crate::services::{SecurityTokenRequestType, ServiceMessage};
use crate::transport::{
    write_framed, Acknowledge, AsymmetricSecurityHeader, ChunkOutcome, Finality, FrameReader,
    Hello, MessageType, SecureChannel, SequenceHeader, TransportLimits,
};

/// Connection phase on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the peer's HEL.
    AwaitingHello,
    /// Handshake complete; secure-conversation traffic flows.
    Connected,
}

/// The server side of one transport connection.
///
/// Owns one [`SecureChannel`] per channel the peer opened. Bytes
/// arrive through [`receive`](Self::receive) together with the shared
/// [`Server`]; produced bytes leave through
/// [`take_output`](Self::take_output).
#[derive(Debug)]
pub struct ServerConnection {
    phase: Phase,
    reader: FrameReader,
    out: Buffer,
    peer_limits: TransportLimits,
    channels: HashMap<u32, SecureChannel>,
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConnection {
    /// A connection awaiting its HEL.
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingHello,
            reader: FrameReader::new(),
            out: Buffer::new(),
            peer_limits: TransportLimits::default(),
            channels: HashMap::new(),
        }
    }

    /// Whether the HEL/ACK handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    /// Number of secure channels the peer holds open.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Drain the bytes produced since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.out.take_all()
    }

    /// Feed received stream bytes and process every complete message.
    ///
    /// An error is fatal to the connection; the caller should emit an
    /// ERR frame where possible, call [`teardown`](Self::teardown) and
    /// drop the socket.
    pub fn receive(&mut self, server: &mut Server, data: &[u8]) -> Result<(), TransportError> {
        self.reader.push(data);
        while let Some((header, mut body)) = self.reader.next_frame()? {
            match header.message_type {
                MessageType::Hello => {
                    let hello = Hello::decode(&mut body)?;
                    self.peer_limits = hello.limits;
                    debug!(
                        endpoint = %hello.endpoint_url,
                        receive_buffer = hello.limits.receive_buffer_size,
                        "peer hello"
                    );
                    let mut ack = Buffer::new();
                    Acknowledge {
                        limits: *server.limits(),
                    }
                    .encode(&mut ack)?;
                    write_framed(
                        &mut self.out,
                        MessageType::Acknowledge,
                        Finality::Final,
                        None,
                        &mut ack,
                    )?;
                    self.phase = Phase::Connected;
                }
                MessageType::Error => {
                    let err = crate::transport::ErrorMessage::decode(&mut body)?;
                    return Err(TransportError::PeerError {
                        code: StatusCode(err.error),
                        reason: err.reason,
                    });
                }
                MessageType::OpenChannel => {
                    if self.phase != Phase::Connected {
                        return Err(TransportError::UnexpectedMessage("OPN before HEL"));
                    }
                    self.handle_open(server, body)?;
                }
                MessageType::Message | MessageType::CloseChannel => {
                    if self.phase != Phase::Connected {
                        return Err(TransportError::UnexpectedMessage("MSG before HEL"));
                    }
                    let channel_id = u32::decode(&mut body)?;
                    let channel = self
                        .channels
                        .get_mut(&channel_id)
                        .ok_or(TransportError::UnknownChannel(channel_id))?;
                    match channel.handle_chunk(&header, body)? {
                        ChunkOutcome::Incomplete => {}
                        ChunkOutcome::Aborted {
                            request_id, error, ..
                        } => {
                            debug!(request = request_id, %error, "request aborted by client");
                        }
                        ChunkOutcome::Message {
                            request_id,
                            message,
                        } => {
                            let closed = server.dispatch(
                                channel,
                                request_id,
                                message,
                                &self.peer_limits,
                                &mut self.out,
                            )?;
                            if closed {
                                self.channels.remove(&channel_id);
                            }
                        }
                    }
                }
                MessageType::Acknowledge => {
                    return Err(TransportError::UnexpectedMessage("ACK"));
                }
            }
        }
        Ok(())
    }

    /// The connection is gone: close every channel and unbind their
    /// sessions.
    pub fn teardown(&mut self, server: &mut Server) {
        for (_, mut channel) in self.channels.drain() {
            server.on_channel_closed(channel.attached_session());
            channel.close();
        }
    }

    /// Process an OPN message: allocate (or renew) the channel, then
    /// hand the decoded request to the server.
    fn handle_open(&mut self, server: &mut Server, mut body: Buffer) -> Result<(), TransportError> {
        let requested_id = u32::decode(&mut body)?;
        let _security = AsymmetricSecurityHeader::decode(&mut body)?;
        let sequence = SequenceHeader::decode(&mut body)?;
        let message = ServiceMessage::decode(&mut body)?;
        if !body.is_empty() {
            return Err(CodecError::TrailingBytes(body.len()).into());
        }
        let ServiceMessage::OpenSecureChannelRequest(request) = message else {
            return Err(TransportError::UnexpectedMessage("OPN"));
        };

        let renewing = request.request_type == SecurityTokenRequestType::Renew
            && self.channels.contains_key(&requested_id);
        let channel_id = if renewing {
            requested_id
        } else {
            server.allocate_channel_id()
        };
        let channel = self.channels.entry(channel_id).or_default();
        if renewing {
            debug!(channel = channel_id, "token renewal");
        }
        server.open_secure_channel(
            channel,
            channel_id,
            sequence.request_id,
            request,
            &self.peer_limits,
            &mut self.out,
        )
    }
}

#[cfg(all(test, feature = "client"))]
mod tests {
    use super::*;
    use crate::client::{ClientConnection, ConnPhase, SessionState};
    use crate::server::{
        AddressSpace, VariableNode, ACCESS_LEVEL_CURRENT_READ, ACCESS_LEVEL_CURRENT_WRITE,
    };
    use crate::services::{
        AttributeId, ReadRequest, ReadValueId, TimestampsToReturn, WriteRequest, WriteValue,
    };
    use crate::codec::WriteBuffer;
    use crate::types::{DataValue, NodeId, QualifiedName, Variant};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn field_device_space() -> AddressSpace {
        let mut space = AddressSpace::new();
        for name in ["I1", "I2", "I3"] {
            space.add_node(VariableNode::new(
                NodeId::string(1, name),
                QualifiedName::new(1, name),
                Variant::Boolean(true),
            ));
        }
        for name in ["Q1", "Q2"] {
            space.add_node(
                VariableNode::new(
                    NodeId::string(1, name),
                    QualifiedName::new(1, name),
                    Variant::Boolean(false),
                )
                .with_access_level(ACCESS_LEVEL_CURRENT_READ | ACCESS_LEVEL_CURRENT_WRITE),
            );
        }
        space
    }

    /// Shuttle bytes between the client and server conns until both
    /// sides fall silent.
    fn pump(
        client: &mut ClientConnection,
        server_conn: &mut ServerConnection,
        server: &mut Server,
    ) {
        loop {
            let to_server = client.take_output();
            let to_client = server_conn.take_output();
            if to_server.is_empty() && to_client.is_empty() {
                return;
            }
            if !to_server.is_empty() {
                server_conn.receive(server, &to_server).unwrap();
            }
            if !to_client.is_empty() {
                client.receive(&to_client).unwrap();
            }
        }
    }

    fn established_pair() -> (ClientConnection, ServerConnection, Server, usize) {
        let mut server = Server::new(field_device_space());
        let mut server_conn = ServerConnection::new();

        let mut client = ClientConnection::new("opc.tcp://127.0.0.1:6001/device");
        client.on_connected().unwrap();
        let channel = client.open_channel().unwrap();
        let established = Arc::new(AtomicU32::new(0));
        let flag = established.clone();
        let session = client.create_session(
            channel,
            "loopback session",
            Box::new(move |result| {
                assert!(result.is_ok());
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );

        pump(&mut client, &mut server_conn, &mut server);

        assert_eq!(client.phase(), ConnPhase::Connected);
        assert_eq!(established.load(Ordering::SeqCst), 1);
        assert_eq!(client.session_state(session), Some(SessionState::Active));
        assert_eq!(server.session_count(), 1);
        (client, server_conn, server, session)
    }

    #[test]
    fn test_end_to_end_session_establishment() {
        established_pair();
    }

    #[test]
    fn test_end_to_end_read() {
        let (mut client, mut server_conn, mut server, session) = established_pair();

        let results = Arc::new(Mutex::new(None));
        let slot = results.clone();
        let msg = ServiceMessage::ReadRequest(ReadRequest {
            max_age: 1500.0,
            timestamps_to_return: TimestampsToReturn::Server,
            nodes_to_read: vec![
                ReadValueId::new(NodeId::string(1, "I1"), AttributeId::Value),
                ReadValueId::new(NodeId::string(1, "missing"), AttributeId::Value),
            ],
            ..Default::default()
        });
        client.send(
            session,
            msg,
            Box::new(move |result| {
                *slot.lock().unwrap() = Some(result);
            }),
        );
        pump(&mut client, &mut server_conn, &mut server);

        let response = results.lock().unwrap().take().unwrap().unwrap();
        let ServiceMessage::ReadResponse(resp) = response else {
            panic!("expected ReadResponse");
        };
        assert!(resp.response_header.service_result.is_good());
        assert_eq!(resp.results.len(), 2);

        // First node exists: boolean value + server timestamp.
        assert_eq!(resp.results[0].value, Some(Variant::Boolean(true)));
        assert!(resp.results[0].server_timestamp.is_some());
        assert!(resp.results[0].source_timestamp.is_none());

        // Second node is unknown.
        assert_eq!(
            resp.results[1].status,
            Some(crate::core::StatusCode::BAD_NODE_ID_UNKNOWN)
        );
        assert!(resp.results[1].value.is_none());
    }

    #[test]
    fn test_end_to_end_write() {
        let (mut client, mut server_conn, mut server, session) = established_pair();

        let results = Arc::new(Mutex::new(None));
        let slot = results.clone();
        let msg = ServiceMessage::WriteRequest(WriteRequest {
            nodes_to_write: vec![
                WriteValue::new(
                    NodeId::string(1, "Q1"),
                    AttributeId::Value,
                    DataValue::of(Variant::Boolean(true)),
                ),
                WriteValue::new(
                    NodeId::string(1, "Q2"),
                    AttributeId::Value,
                    DataValue::of(Variant::UInt16(9)),
                ),
                WriteValue::new(
                    NodeId::string(1, "I1"),
                    AttributeId::Value,
                    DataValue::of(Variant::Boolean(false)),
                ),
            ],
            ..Default::default()
        });
        client.send(
            session,
            msg,
            Box::new(move |result| {
                *slot.lock().unwrap() = Some(result);
            }),
        );
        pump(&mut client, &mut server_conn, &mut server);

        let response = results.lock().unwrap().take().unwrap().unwrap();
        let ServiceMessage::WriteResponse(resp) = response else {
            panic!("expected WriteResponse");
        };
        assert_eq!(
            resp.results,
            vec![
                crate::core::StatusCode::GOOD,
                crate::core::StatusCode::BAD_TYPE_MISMATCH,
                crate::core::StatusCode::BAD_NOT_WRITABLE,
            ]
        );
    }

    #[test]
    fn test_chunked_response_over_small_buffers() {
        // A client that advertises a tiny receive buffer forces the
        // server to split the read response into several chunks.
        let mut server = Server::new(field_device_space());
        let mut server_conn = ServerConnection::new();
        let mut client = ClientConnection::new("opc.tcp://127.0.0.1:6001/device");
        client.on_connected().unwrap();
        // Tamper with the HEL before the server sees it: rewrite the
        // advertised receive buffer by re-issuing the hello from a
        // connection configured with small limits.
        // (Simpler: read many nodes so the response exceeds 256 bytes
        // is not possible with the default 1 MiB buffer, so this test
        // drives the server-side channel directly.)
        let channel = client.open_channel().unwrap();
        let session = client.create_session(channel, "chunky", Box::new(|_| {}));
        pump(&mut client, &mut server_conn, &mut server);
        assert_eq!(client.session_state(session), Some(SessionState::Active));

        // Issue a read of every node multiple times to build a large
        // response, delivered through a server channel whose peer
        // limits we shrink.
        let nodes: Vec<ReadValueId> = (0..60)
            .flat_map(|_| {
                ["I1", "I2", "I3"]
                    .iter()
                    .map(|n| ReadValueId::new(NodeId::string(1, *n), AttributeId::Value))
                    .collect::<Vec<_>>()
            })
            .collect();

        let results = Arc::new(Mutex::new(None));
        let slot = results.clone();
        client.send(
            session,
            ServiceMessage::ReadRequest(ReadRequest {
                max_age: 0.0,
                timestamps_to_return: TimestampsToReturn::Neither,
                nodes_to_read: nodes,
                ..Default::default()
            }),
            Box::new(move |result| {
                *slot.lock().unwrap() = Some(result);
            }),
        );

        // Deliver the request to the server but shrink what the server
        // believes the client can accept before it responds.
        let to_server = client.take_output();
        server_conn.peer_limits.receive_buffer_size = 256;
        server_conn.receive(&mut server, &to_server).unwrap();
        let to_client = server_conn.take_output();

        // The response must arrive as several frames.
        let mut frame_count = 0usize;
        {
            let mut reader = FrameReader::new();
            reader.push(&to_client);
            while let Some((header, _)) = reader.next_frame().unwrap() {
                assert!(header.message_size <= 256);
                frame_count += 1;
            }
        }
        assert!(frame_count >= 2, "expected a chunked response");

        client.receive(&to_client).unwrap();
        let response = results.lock().unwrap().take().unwrap().unwrap();
        let ServiceMessage::ReadResponse(resp) = response else {
            panic!("expected ReadResponse");
        };
        assert_eq!(resp.results.len(), 180);
    }

    #[test]
    fn test_unknown_channel_is_fatal() {
        let mut server = Server::new(AddressSpace::new());
        let mut conn = ServerConnection::new();

        // Handshake first.
        let mut client = ClientConnection::new("opc.tcp://h/x");
        client.on_connected().unwrap();
        conn.receive(&mut server, &client.take_output()).unwrap();
        let _ack = conn.take_output();

        // A MSG for a channel that was never opened.
        let mut frame = Buffer::new();
        let mut body = Buffer::new();
        body.write(&[0u8; 12]);
        write_framed(
            &mut frame,
            MessageType::Message,
            Finality::Final,
            Some(99),
            &mut body,
        )
        .unwrap();
        let bytes = frame.take_all();
        assert!(matches!(
            conn.receive(&mut server, &bytes),
            Err(TransportError::UnknownChannel(99))
        ));
    }
}
