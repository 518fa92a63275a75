//! Outer message headers and handshake bodies.

use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::constants::{
    DEFAULT_RECEIVE_BUFFER_SIZE, DEFAULT_SEND_BUFFER_SIZE, MAX_ENDPOINT_URL_LENGTH,
    MESSAGE_HEADER_SIZE, PROTOCOL_VERSION,
};
use crate::core::{CodecError, TransportError};

/// The six outer message types, 3 ASCII bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `HEL` - client hello.
    Hello,
    /// `ACK` - server acknowledge.
    Acknowledge,
    /// `ERR` - fatal transport error.
    Error,
    /// `OPN` - open (or renew) a secure channel.
    OpenChannel,
    /// `MSG` - secure-conversation service message.
    Message,
    /// `CLO` - close a secure channel.
    CloseChannel,
}

impl MessageType {
    /// The 3-byte wire tag.
    pub const fn as_bytes(self) -> [u8; 3] {
        match self {
            Self::Hello => *b"HEL",
            Self::Acknowledge => *b"ACK",
            Self::Error => *b"ERR",
            Self::OpenChannel => *b"OPN",
            Self::Message => *b"MSG",
            Self::CloseChannel => *b"CLO",
        }
    }

    /// Parse the 3-byte wire tag.
    pub fn from_bytes(bytes: [u8; 3]) -> Option<Self> {
        match &bytes {
            b"HEL" => Some(Self::Hello),
            b"ACK" => Some(Self::Acknowledge),
            b"ERR" => Some(Self::Error),
            b"OPN" => Some(Self::OpenChannel),
            b"MSG" => Some(Self::Message),
            b"CLO" => Some(Self::CloseChannel),
            _ => None,
        }
    }

    /// Whether this message carries a secure-channel id after the
    /// outer header.
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::OpenChannel | Self::Message | Self::CloseChannel)
    }
}

/// Chunk finality: whether more chunks of the same message follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finality {
    /// `C` - more chunks follow.
    Intermediate,
    /// `F` - last chunk of the message.
    Final,
    /// `A` - the message is abandoned; the body carries an error.
    Aborted,
}

impl Finality {
    /// The wire byte.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Intermediate => b'C',
            Self::Final => b'F',
            Self::Aborted => b'A',
        }
    }

    /// Parse the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'C' => Some(Self::Intermediate),
            b'F' => Some(Self::Final),
            b'A' => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// The 8-byte header leading every transport message.
///
/// Wire format:
/// ```text
/// +---------+----------+---------------------+
/// | Type    | Finality | Message Size        |
/// | 3 bytes | 1 byte   | 4 bytes LE32,       |
/// |         |          | header inclusive    |
/// +---------+----------+---------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// The outer message type.
    pub message_type: MessageType,
    /// Chunk finality.
    pub finality: Finality,
    /// Total message size including this header.
    pub message_size: u32,
}

impl MessageHeader {
    /// Serialized header size.
    pub const SIZE: usize = MESSAGE_HEADER_SIZE;

    /// Append the header's wire form.
    pub fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) {
        buf.write(&self.message_type.as_bytes());
        buf.write(&[self.finality.as_byte()]);
        buf.write(&self.message_size.to_le_bytes());
    }

    /// Parse a header; the buffer must hold at least [`Self::SIZE`]
    /// bytes.
    pub fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, TransportError> {
        let mut tag = [0u8; 3];
        buf.read_exact(&mut tag)?;
        let message_type =
            MessageType::from_bytes(tag).ok_or(TransportError::InvalidMessageType(tag))?;
        let finality_byte = buf.read_byte()?;
        let finality =
            Finality::from_byte(finality_byte).ok_or(TransportError::InvalidFinality(finality_byte))?;
        let message_size = u32::decode(buf)?;
        if (message_size as usize) < Self::SIZE {
            return Err(TransportError::InvalidMessageSize(message_size));
        }
        Ok(Self {
            message_type,
            finality,
            message_size,
        })
    }

    /// The body size this header announces.
    pub fn body_size(&self) -> usize {
        self.message_size as usize - Self::SIZE
    }
}

/// The buffer and message limits a peer advertises in HEL/ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Protocol version, currently 0.
    pub protocol_version: u32,
    /// Largest chunk the peer will accept.
    pub receive_buffer_size: u32,
    /// Largest chunk the peer will send.
    pub send_buffer_size: u32,
    /// Largest assembled message the peer will accept, 0 for no limit.
    pub max_message_size: u32,
    /// Most chunks per message the peer will accept, 0 for no limit.
    pub max_chunk_count: u32,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            max_message_size: 0,
            max_chunk_count: 0,
        }
    }
}

impl BinaryEncode for TransportLimits {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.protocol_version.encode(buf)?;
        self.receive_buffer_size.encode(buf)?;
        self.send_buffer_size.encode(buf)?;
        self.max_message_size.encode(buf)?;
        self.max_chunk_count.encode(buf)
    }
}

impl BinaryDecode for TransportLimits {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            protocol_version: u32::decode(buf)?,
            receive_buffer_size: u32::decode(buf)?,
            send_buffer_size: u32::decode(buf)?,
            max_message_size: u32::decode(buf)?,
            max_chunk_count: u32::decode(buf)?,
        })
    }
}

/// The HEL body a client sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// The client's limits.
    pub limits: TransportLimits,
    /// The endpoint the client wants, at most 4096 bytes.
    pub endpoint_url: String,
}

impl BinaryEncode for Hello {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        if self.endpoint_url.len() > MAX_ENDPOINT_URL_LENGTH {
            return Err(CodecError::EndpointUrlTooLong(self.endpoint_url.len()));
        }
        self.limits.encode(buf)?;
        self.endpoint_url.encode(buf)
    }
}

impl BinaryDecode for Hello {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let limits = TransportLimits::decode(buf)?;
        let endpoint_url = String::decode(buf)?;
        if endpoint_url.len() > MAX_ENDPOINT_URL_LENGTH {
            return Err(CodecError::EndpointUrlTooLong(endpoint_url.len()));
        }
        Ok(Self {
            limits,
            endpoint_url,
        })
    }
}

/// The ACK body a server answers a HEL with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acknowledge {
    /// The server's limits.
    pub limits: TransportLimits,
}

impl BinaryEncode for Acknowledge {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.limits.encode(buf)
    }
}

impl BinaryDecode for Acknowledge {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            limits: TransportLimits::decode(buf)?,
        })
    }
}

/// The ERR body reporting a fatal transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorMessage {
    /// The error code.
    pub error: u32,
    /// Human-readable reason.
    pub reason: String,
}

impl BinaryEncode for ErrorMessage {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.error.encode(buf)?;
        self.reason.encode(buf)
    }
}

impl BinaryDecode for ErrorMessage {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            error: u32::decode(buf)?,
            reason: String::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_message_type_tags() {
        for t in [
            MessageType::Hello,
            MessageType::Acknowledge,
            MessageType::Error,
            MessageType::OpenChannel,
            MessageType::Message,
            MessageType::CloseChannel,
        ] {
            assert_eq!(MessageType::from_bytes(t.as_bytes()), Some(t));
        }
        assert_eq!(MessageType::from_bytes(*b"XXX"), None);
        assert!(MessageType::OpenChannel.is_secure());
        assert!(!MessageType::Hello.is_secure());
    }

    #[test]
    fn test_finality_bytes() {
        assert_eq!(Finality::Intermediate.as_byte(), 0x43);
        assert_eq!(Finality::Final.as_byte(), 0x46);
        assert_eq!(Finality::Aborted.as_byte(), 0x41);
        assert_eq!(Finality::from_byte(b'F'), Some(Finality::Final));
        assert_eq!(Finality::from_byte(b'Z'), None);
    }

    #[test]
    fn test_header_round_trip() {
        let header = MessageHeader {
            message_type: MessageType::Message,
            finality: Finality::Final,
            message_size: 42,
        };
        let mut buf = Buffer::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), MessageHeader::SIZE);
        assert_eq!(MessageHeader::decode(&mut buf).unwrap(), header);
    }

    #[test]
    fn test_header_wire_form() {
        let header = MessageHeader {
            message_type: MessageType::Hello,
            finality: Finality::Final,
            message_size: 0x20,
        };
        let mut buf = Buffer::new();
        header.encode(&mut buf);
        assert_eq!(buf.take_all(), [b'H', b'E', b'L', b'F', 0x20, 0, 0, 0]);
    }

    #[test]
    fn test_header_rejects_bad_type() {
        let mut buf = Buffer::from(&b"XYZF\x10\x00\x00\x00"[..]);
        assert!(matches!(
            MessageHeader::decode(&mut buf),
            Err(TransportError::InvalidMessageType(_))
        ));
    }

    #[test]
    fn test_header_rejects_bad_finality() {
        let mut buf = Buffer::from(&b"MSGX\x10\x00\x00\x00"[..]);
        assert!(matches!(
            MessageHeader::decode(&mut buf),
            Err(TransportError::InvalidFinality(b'X'))
        ));
    }

    #[test]
    fn test_header_rejects_undersized() {
        let mut buf = Buffer::from(&b"MSGF\x04\x00\x00\x00"[..]);
        assert!(matches!(
            MessageHeader::decode(&mut buf),
            Err(TransportError::InvalidMessageSize(4))
        ));
    }

    #[test]
    fn test_hello_round_trip() {
        let hello = Hello {
            limits: TransportLimits::default(),
            endpoint_url: "opc.tcp://h:6001/x".into(),
        };
        let mut buf = Buffer::new();
        hello.encode(&mut buf).unwrap();
        assert_eq!(Hello::decode(&mut buf).unwrap(), hello);
    }

    #[test]
    fn test_hello_rejects_oversized_url() {
        let hello = Hello {
            limits: TransportLimits::default(),
            endpoint_url: "x".repeat(MAX_ENDPOINT_URL_LENGTH + 1),
        };
        let mut buf = Buffer::new();
        assert!(matches!(
            hello.encode(&mut buf),
            Err(CodecError::EndpointUrlTooLong(_))
        ));
    }

    #[test]
    fn test_error_message_round_trip() {
        let err = ErrorMessage {
            error: 0x8007_0000,
            reason: "decoding failure".into(),
        };
        let mut buf = Buffer::new();
        err.encode(&mut buf).unwrap();
        assert_eq!(ErrorMessage::decode(&mut buf).unwrap(), err);
    }
}
