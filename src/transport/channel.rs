//! The secure-channel state machine: chunked writes, reassembly and
//! token checking.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::chunk::{AsymmetricSecurityHeader, SequenceHeader, SymmetricSecurityHeader};
use super::framing::write_framed;
use super::message::{Finality, MessageHeader, MessageType, TransportLimits};
use crate::codec::{BinaryDecode, BinaryEncode, Buffer, WriteBuffer};
use crate::core::constants::{
    SECURE_MESSAGE_HEADER_SIZE, SEQUENCE_HEADER_SIZE, TOKEN_RENEWAL_PERCENT,
};
use crate::core::{CodecError, StatusCode, TransportError};
use crate::services::{ChannelSecurityToken, ServiceMessage};
use crate::types::DateTime;

/// Lifecycle of a secure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// OpenSecureChannel has been (or is about to be) sent.
    Opening,
    /// The channel holds a valid token.
    Open,
    /// The channel is closed; no further traffic is accepted.
    Closed,
}

/// What an incoming chunk produced.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// An intermediate chunk was stored; the message is not complete.
    Incomplete,
    /// The peer abandoned the message with an error.
    Aborted {
        /// Request id of the abandoned message.
        request_id: u32,
        /// Error code from the abort body.
        error: StatusCode,
        /// Human-readable reason from the abort body.
        reason: String,
    },
    /// A complete service message was reassembled and decoded.
    Message {
        /// Request id correlating the message.
        request_id: u32,
        /// The decoded message.
        message: ServiceMessage,
    },
}

/// One secure channel: counters, the current token and the chunk
/// reassembly store.
///
/// The channel is role-agnostic; client and server connections drive
/// it with their own handshake logic. Sequence numbers and request ids
/// are scoped to the channel and strictly increase for its lifetime.
#[derive(Debug)]
pub struct SecureChannel {
    channel_id: u32,
    token_id: u32,
    token_created_at: DateTime,
    revised_lifetime_ms: u32,
    state: ChannelState,
    sequence_number: u32,
    next_request_id: u32,
    /// Request id of our in-flight OPN, while one is outstanding.
    open_request_id: Option<u32>,
    /// Partially reassembled messages keyed by request id.
    reassembly: HashMap<u32, Buffer>,
    /// Session this channel serves, keyed by authentication token
    /// (server side).
    attached_session: Option<crate::types::NodeId>,
}

impl Default for SecureChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureChannel {
    /// A fresh channel in the opening state.
    pub fn new() -> Self {
        Self {
            channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::EPOCH,
            revised_lifetime_ms: 0,
            state: ChannelState::Opening,
            sequence_number: 1,
            next_request_id: 1,
            open_request_id: None,
            reassembly: HashMap::new(),
            attached_session: None,
        }
    }

    /// The server-assigned channel id.
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// The current security token id.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// The channel's lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Request id of the in-flight OpenSecureChannel, if any.
    pub fn open_request_id(&self) -> Option<u32> {
        self.open_request_id
    }

    /// The session this channel serves, by authentication token.
    pub fn attached_session(&self) -> Option<&crate::types::NodeId> {
        self.attached_session.as_ref()
    }

    /// Attach the session this channel serves.
    pub fn attach_session(&mut self, token: crate::types::NodeId) {
        self.attached_session = Some(token);
    }

    /// Record the in-flight OPN request id (client side).
    pub fn mark_opening(&mut self, request_id: u32) {
        self.open_request_id = Some(request_id);
    }

    /// Adopt the token granted by an OpenSecureChannelResponse
    /// (client side).
    pub fn complete_open(&mut self, header_channel_id: u32, token: &ChannelSecurityToken) {
        if token.channel_id != header_channel_id {
            warn!(
                header = header_channel_id,
                token = token.channel_id,
                "channel id mismatch between header and security token"
            );
        }
        self.channel_id = header_channel_id;
        self.token_id = token.token_id;
        self.token_created_at = DateTime::now();
        self.revised_lifetime_ms = token.revised_lifetime;
        self.open_request_id = None;
        self.state = ChannelState::Open;
        debug!(channel = self.channel_id, token = self.token_id, "channel open");
    }

    /// Install a freshly minted token (server side).
    pub fn open_for_server(&mut self, channel_id: u32, token_id: u32, lifetime_ms: u32) {
        self.channel_id = channel_id;
        self.token_id = token_id;
        self.token_created_at = DateTime::now();
        self.revised_lifetime_ms = lifetime_ms;
        self.state = ChannelState::Open;
        debug!(channel = channel_id, token = token_id, "channel open");
    }

    /// Close the channel and drop all partial reassembly state.
    pub fn close(&mut self) {
        self.state = ChannelState::Closed;
        self.reassembly.clear();
        debug!(channel = self.channel_id, "channel closed");
    }

    /// Whether the token is old enough that a RENEW should be issued.
    pub fn needs_renewal(&self, now: DateTime) -> bool {
        self.state == ChannelState::Open
            && self.open_request_id.is_none()
            && self.revised_lifetime_ms > 0
            && now.millis_since(self.token_created_at)
                >= u64::from(self.revised_lifetime_ms) * TOKEN_RENEWAL_PERCENT / 100
    }

    /// Draw the next request id.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn next_sequence_number(&mut self) -> u32 {
        let seq = self.sequence_number;
        self.sequence_number += 1;
        seq
    }

    /// Send a request: draws a request id, stamps the request header
    /// and emits the chunked message. Returns the request id used.
    pub fn send_request(
        &mut self,
        mut msg: ServiceMessage,
        msg_type: MessageType,
        peer: &TransportLimits,
        out: &mut Buffer,
    ) -> Result<u32, TransportError> {
        let request_id = self.next_request_id();
        if let Some(header) = msg.request_header_mut() {
            header.timestamp = DateTime::now();
            header.request_handle = request_id;
        }
        self.write_chunked(&msg, request_id, msg_type, peer, out)?;
        Ok(request_id)
    }

    /// Send a response correlated to `request_id`. The response header
    /// is stamped with the current time; its request handle is left as
    /// the dispatcher set it.
    pub fn send_response(
        &mut self,
        msg: &mut ServiceMessage,
        request_id: u32,
        msg_type: MessageType,
        peer: &TransportLimits,
        out: &mut Buffer,
    ) -> Result<(), TransportError> {
        if let Some(header) = msg.response_header_mut() {
            header.timestamp = DateTime::now();
        }
        self.write_chunked(msg, request_id, msg_type, peer, out)
    }

    /// Split one service message into chunks sized to the peer's
    /// receive buffer and emit each as a framed message.
    ///
    /// Every chunk repeats the security header and the request id;
    /// only the sequence number advances.
    fn write_chunked(
        &mut self,
        msg: &ServiceMessage,
        request_id: u32,
        msg_type: MessageType,
        peer: &TransportLimits,
        out: &mut Buffer,
    ) -> Result<(), TransportError> {
        let mut security = Buffer::new();
        if msg_type == MessageType::OpenChannel {
            AsymmetricSecurityHeader::none().encode(&mut security)?;
        } else {
            SymmetricSecurityHeader {
                token_id: self.token_id,
            }
            .encode(&mut security)?;
        }
        let security_bytes = security.take_all();

        let mut body = Buffer::new();
        msg.encode(&mut body)?;

        let overhead = SECURE_MESSAGE_HEADER_SIZE + SEQUENCE_HEADER_SIZE + security_bytes.len();
        let max_chunk_body = (peer.receive_buffer_size as usize).saturating_sub(overhead).max(1);

        loop {
            let take = body.len().min(max_chunk_body);
            let mut chunk = Buffer::new();
            chunk.write(&security_bytes);
            SequenceHeader {
                sequence_number: self.next_sequence_number(),
                request_id,
            }
            .encode(&mut chunk)?;
            chunk.move_from(&mut body, take)?;

            let finality = if body.is_empty() {
                Finality::Final
            } else {
                Finality::Intermediate
            };
            write_framed(out, msg_type, finality, Some(self.channel_id), &mut chunk)?;

            if body.is_empty() {
                return Ok(());
            }
        }
    }

    /// Process one inbound chunk (the frame body after the secure
    /// channel id).
    ///
    /// OPN chunks carry the asymmetric header; everything else carries
    /// the symmetric header, whose token must match the channel's
    /// current token.
    pub fn handle_chunk(
        &mut self,
        header: &MessageHeader,
        mut chunk: Buffer,
    ) -> Result<ChunkOutcome, TransportError> {
        if header.message_type == MessageType::OpenChannel {
            let _security = AsymmetricSecurityHeader::decode(&mut chunk)?;
        } else {
            let security = SymmetricSecurityHeader::decode(&mut chunk)?;
            if security.token_id != self.token_id {
                return Err(TransportError::TokenMismatch {
                    expected: self.token_id,
                    got: security.token_id,
                });
            }
        }

        let sequence = SequenceHeader::decode(&mut chunk)?;
        let request_id = sequence.request_id;

        let mut body = Buffer::new();
        match header.finality {
            Finality::Intermediate => {
                self.reassembly.entry(request_id).or_default().move_all(&mut chunk);
                return Ok(ChunkOutcome::Incomplete);
            }
            Finality::Aborted => {
                let error = StatusCode(u32::decode(&mut chunk)?);
                let reason = String::decode(&mut chunk)?;
                self.reassembly.remove(&request_id);
                debug!(request = request_id, %error, "message aborted by peer");
                return Ok(ChunkOutcome::Aborted {
                    request_id,
                    error,
                    reason,
                });
            }
            Finality::Final => {
                if let Some(mut stored) = self.reassembly.remove(&request_id) {
                    body.move_all(&mut stored);
                }
                body.move_all(&mut chunk);
            }
        }

        let message = ServiceMessage::decode(&mut body)?;
        if !body.is_empty() {
            return Err(CodecError::TrailingBytes(body.len()).into());
        }
        Ok(ChunkOutcome::Message {
            request_id,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CloseSecureChannelRequest, ReadRequest, ReadValueId};
    use crate::services::{AttributeId, TimestampsToReturn};
    use crate::types::NodeId;

    fn open_channel(channel_id: u32, token_id: u32) -> SecureChannel {
        let mut ch = SecureChannel::new();
        ch.open_for_server(channel_id, token_id, 360_000);
        ch
    }

    /// Parse every framed chunk out of an output buffer.
    fn parse_chunks(out: &mut Buffer) -> Vec<(MessageHeader, u32, SequenceHeader, Buffer)> {
        let mut reader = super::super::framing::FrameReader::new();
        reader.push(&out.take_all());
        let mut chunks = Vec::new();
        while let Some((header, mut body)) = reader.next_frame().unwrap() {
            let channel_id = u32::decode(&mut body).unwrap();
            // Skip the symmetric security header.
            let _token = SymmetricSecurityHeader::decode(&mut body).unwrap();
            let seq = SequenceHeader::decode(&mut body).unwrap();
            chunks.push((header, channel_id, seq, body));
        }
        chunks
    }

    fn big_read_request() -> ServiceMessage {
        let nodes = (0..100)
            .map(|i| ReadValueId::new(NodeId::string(1, format!("node-{i}")), AttributeId::Value))
            .collect();
        ServiceMessage::ReadRequest(ReadRequest {
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Neither,
            nodes_to_read: nodes,
            ..Default::default()
        })
    }

    #[test]
    fn test_single_chunk_write() {
        let mut ch = open_channel(5, 99);
        let mut out = Buffer::new();
        let peer = TransportLimits::default();

        let req = ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default());
        let id = ch
            .send_request(req, MessageType::CloseChannel, &peer, &mut out)
            .unwrap();

        let chunks = parse_chunks(&mut out);
        assert_eq!(chunks.len(), 1);
        let (header, channel_id, seq, _) = &chunks[0];
        assert_eq!(header.finality, Finality::Final);
        assert_eq!(*channel_id, 5);
        assert_eq!(seq.request_id, id);
    }

    #[test]
    fn test_chunking_against_small_receive_buffer() {
        let mut ch = open_channel(2, 7);
        let mut out = Buffer::new();
        let peer = TransportLimits {
            receive_buffer_size: 256,
            ..Default::default()
        };

        let id = ch
            .send_request(big_read_request(), MessageType::Message, &peer, &mut out)
            .unwrap();

        let chunks = parse_chunks(&mut out);
        assert!(chunks.len() >= 2, "expected multiple chunks");

        // Exactly one FINAL chunk, and it is last; all others are
        // INTERMEDIATE; request id constant; sequence numbers n, n+1, ...
        for (i, (header, channel_id, seq, _)) in chunks.iter().enumerate() {
            assert_eq!(*channel_id, 2);
            assert_eq!(seq.request_id, id);
            if i + 1 == chunks.len() {
                assert_eq!(header.finality, Finality::Final);
            } else {
                assert_eq!(header.finality, Finality::Intermediate);
            }
        }
        let first = chunks[0].2.sequence_number;
        for (i, (_, _, seq, _)) in chunks.iter().enumerate() {
            assert_eq!(seq.sequence_number, first + i as u32);
        }

        // No chunk exceeds the advertised receive buffer.
        for (header, ..) in &chunks {
            assert!(header.message_size <= 256);
        }
    }

    #[test]
    fn test_reassembly_round_trip() {
        // Writer splits, reader reassembles the identical message.
        let mut writer = open_channel(3, 40);
        let mut reader = open_channel(3, 40);
        let peer = TransportLimits {
            receive_buffer_size: 200,
            ..Default::default()
        };

        let msg = big_read_request();
        let mut out = Buffer::new();
        let id = writer
            .send_request(msg.clone(), MessageType::Message, &peer, &mut out)
            .unwrap();

        let mut pump = super::super::framing::FrameReader::new();
        pump.push(&out.take_all());
        let mut final_outcome = None;
        while let Some((header, mut body)) = pump.next_frame().unwrap() {
            let _channel = u32::decode(&mut body).unwrap();
            match reader.handle_chunk(&header, body).unwrap() {
                ChunkOutcome::Incomplete => {}
                outcome => final_outcome = Some(outcome),
            }
        }

        match final_outcome {
            Some(ChunkOutcome::Message {
                request_id,
                message,
            }) => {
                assert_eq!(request_id, id);
                // The writer stamped the request header, so compare
                // the payload rather than the whole message.
                match (message, msg) {
                    (ServiceMessage::ReadRequest(got), ServiceMessage::ReadRequest(sent)) => {
                        assert_eq!(got.nodes_to_read, sent.nodes_to_read);
                    }
                    other => panic!("unexpected messages: {other:?}"),
                }
            }
            other => panic!("expected a reassembled message, got {other:?}"),
        }
    }

    #[test]
    fn test_token_mismatch_rejected() {
        let mut sender = open_channel(1, 1111);
        let mut receiver = open_channel(1, 2222);
        let peer = TransportLimits::default();

        let mut out = Buffer::new();
        sender
            .send_request(
                ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default()),
                MessageType::Message,
                &peer,
                &mut out,
            )
            .unwrap();

        let mut pump = super::super::framing::FrameReader::new();
        pump.push(&out.take_all());
        let (header, mut body) = pump.next_frame().unwrap().unwrap();
        let _channel = u32::decode(&mut body).unwrap();
        assert!(matches!(
            receiver.handle_chunk(&header, body),
            Err(TransportError::TokenMismatch {
                expected: 2222,
                got: 1111
            })
        ));
    }

    #[test]
    fn test_aborted_chunk_evicts_reassembly() {
        let mut receiver = open_channel(4, 10);

        // Store an intermediate chunk for request 77.
        let mut chunk = Buffer::new();
        SymmetricSecurityHeader { token_id: 10 }.encode(&mut chunk).unwrap();
        SequenceHeader {
            sequence_number: 1,
            request_id: 77,
        }
        .encode(&mut chunk)
        .unwrap();
        chunk.write(&[1, 2, 3]);
        let header = MessageHeader {
            message_type: MessageType::Message,
            finality: Finality::Intermediate,
            message_size: 0x20,
        };
        assert!(matches!(
            receiver.handle_chunk(&header, chunk).unwrap(),
            ChunkOutcome::Incomplete
        ));

        // Abort the same request.
        let mut abort = Buffer::new();
        SymmetricSecurityHeader { token_id: 10 }.encode(&mut abort).unwrap();
        SequenceHeader {
            sequence_number: 2,
            request_id: 77,
        }
        .encode(&mut abort)
        .unwrap();
        StatusCode::BAD_COMMUNICATION_ERROR.encode(&mut abort).unwrap();
        "peer gave up".to_string().encode(&mut abort).unwrap();
        let header = MessageHeader {
            finality: Finality::Aborted,
            ..header
        };
        match receiver.handle_chunk(&header, abort).unwrap() {
            ChunkOutcome::Aborted {
                request_id,
                error,
                reason,
            } => {
                assert_eq!(request_id, 77);
                assert_eq!(error, StatusCode::BAD_COMMUNICATION_ERROR);
                assert_eq!(reason, "peer gave up");
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert!(receiver.reassembly.is_empty());
    }

    #[test]
    fn test_renewal_due_after_lifetime_fraction() {
        let mut ch = SecureChannel::new();
        ch.open_for_server(1, 2, 100_000);
        let now = DateTime::now();
        assert!(!ch.needs_renewal(now));
        // 80% of the 100s lifetime elapsed.
        assert!(ch.needs_renewal(now.add_millis(80_000)));
        // Closed channels never renew.
        ch.close();
        assert!(!ch.needs_renewal(now.add_millis(80_000)));
    }

    #[test]
    fn test_request_ids_strictly_increase() {
        let mut ch = open_channel(1, 1);
        let peer = TransportLimits::default();
        let mut out = Buffer::new();
        let a = ch
            .send_request(
                ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default()),
                MessageType::Message,
                &peer,
                &mut out,
            )
            .unwrap();
        let b = ch
            .send_request(
                ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default()),
                MessageType::Message,
                &peer,
                &mut out,
            )
            .unwrap();
        assert!(b > a);
    }
}
