//! Error types for the sans-io protocol core.

use thiserror::Error;

use super::status::StatusCode;

/// Errors raised while encoding or decoding protocol values.
///
/// Decoding errors are fatal to the enclosing chunk and channel;
/// encoding errors abort the write before any bytes are emitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes were available than the decoder required.
    #[error("short read: {needed} bytes needed, {available} available")]
    ShortRead {
        /// Bytes the decoder asked for.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// A string field did not contain valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Unknown node-id encoding tag.
    #[error("invalid node id type: 0x{0:02x}")]
    InvalidNodeIdType(u8),

    /// Unknown variant type tag.
    #[error("invalid variant type: 0x{0:02x}")]
    InvalidVariantType(u8),

    /// The variant encoding mask had the array or dimensions bit set.
    #[error("variant arrays are unsupported (encoding mask 0x{0:02x})")]
    VariantArrayUnsupported(u8),

    /// An enumeration field held a value outside its defined range.
    #[error("invalid {name} value: {value}")]
    InvalidEnumValue {
        /// The enumeration's name.
        name: &'static str,
        /// The offending raw value.
        value: u32,
    },

    /// A type id with no entry in the structure registry.
    #[error("unknown type id: {0}")]
    UnknownTypeId(u32),

    /// A wire encoding id with no entry in the reverse registry.
    #[error("unknown encoding id: {0}")]
    UnknownEncodingId(u32),

    /// An ExtensionObject with an encoding this stack cannot represent.
    #[error("unsupported extension object encoding: {0}")]
    UnsupportedExtensionObject(u8),

    /// A structure type id that is not a namespace-0 numeric NodeId.
    #[error("type id is not a namespace-0 numeric node id")]
    NonStandardTypeId,

    /// A message body left bytes behind after decoding completed.
    #[error("{0} trailing bytes after message body")]
    TrailingBytes(usize),

    /// An endpoint URL longer than the protocol allows.
    #[error("endpoint URL length {0} exceeds 4096 bytes")]
    EndpointUrlTooLong(usize),
}

impl CodecError {
    /// The status code reported to the peer for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EndpointUrlTooLong(_) => StatusCode::BAD_ENCODING_ERROR,
            _ => StatusCode::BAD_DECODING_ERROR,
        }
    }
}

/// Errors raised by the framing and secure-channel layers.
///
/// All of these are fatal to the transport: the connection emits an
/// `ERR` message where possible and closes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A value failed to (de)serialize.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The outer header carried an unknown 3-byte message type.
    #[error("invalid message type: {0:02x?}")]
    InvalidMessageType([u8; 3]),

    /// The outer header carried an unknown finality byte.
    #[error("invalid finality byte: 0x{0:02x}")]
    InvalidFinality(u8),

    /// The outer header's message size is smaller than the header.
    #[error("message size {0} smaller than header")]
    InvalidMessageSize(u32),

    /// The peer reported a fatal error with an ERR message.
    #[error("peer error {code}: {reason}")]
    PeerError {
        /// Error code from the ERR body.
        code: StatusCode,
        /// Human-readable reason from the ERR body.
        reason: String,
    },

    /// A secure-conversation message referenced an unknown channel.
    #[error("unknown secure channel: {0}")]
    UnknownChannel(u32),

    /// A symmetric chunk carried a token the channel does not hold.
    #[error("token {got} rejected (channel holds {expected})")]
    TokenMismatch {
        /// Token the channel currently holds.
        expected: u32,
        /// Token carried by the chunk.
        got: u32,
    },

    /// An OPN response arrived with no matching pending channel.
    #[error("no pending channel matches open response (request id {0})")]
    UnmatchedOpenResponse(u32),

    /// A message arrived for a state the machine is not in.
    #[error("unexpected {0} message in this state")]
    UnexpectedMessage(&'static str),
}

impl TransportError {
    /// The status code placed in the outgoing ERR message.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Codec(e) => e.status(),
            Self::InvalidMessageType(_) | Self::InvalidFinality(_) | Self::InvalidMessageSize(_) => {
                StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID
            }
            Self::PeerError { code, .. } => *code,
            Self::UnknownChannel(_) => StatusCode::BAD_SECURE_CHANNEL_ID_INVALID,
            Self::TokenMismatch { .. } => StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN,
            Self::UnmatchedOpenResponse(_) | Self::UnexpectedMessage(_) => {
                StatusCode::BAD_UNEXPECTED_ERROR
            }
        }
    }
}
