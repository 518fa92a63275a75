//! OpenSecureChannel and CloseSecureChannel services.

use super::header::{RequestHeader, ResponseHeader};
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::CodecError;
use crate::types::{ByteString, DateTime};

/// Whether a channel token is being issued or renewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SecurityTokenRequestType {
    /// First token on a new channel.
    #[default]
    Issue = 0,
    /// Replacement token on a live channel.
    Renew = 1,
}

impl SecurityTokenRequestType {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Issue),
            1 => Some(Self::Renew),
            _ => None,
        }
    }
}

/// The security applied to a channel's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum MessageSecurityMode {
    /// No mode negotiated.
    #[default]
    Invalid = 0,
    /// Plaintext messages. The only mode this stack supports.
    None = 1,
    /// Signed messages (unsupported).
    Sign = 2,
    /// Signed and encrypted messages (unsupported).
    SignAndEncrypt = 3,
}

impl MessageSecurityMode {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::None),
            2 => Some(Self::Sign),
            3 => Some(Self::SignAndEncrypt),
            _ => None,
        }
    }
}

/// The token a server grants when a channel opens or renews.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSecurityToken {
    /// Server-assigned channel id.
    pub channel_id: u32,
    /// Server-assigned token id, checked on every symmetric chunk.
    pub token_id: u32,
    /// When the token was created.
    pub created_at: DateTime,
    /// Token lifetime granted by the server, in milliseconds.
    pub revised_lifetime: u32,
}

impl BinaryEncode for ChannelSecurityToken {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.channel_id.encode(buf)?;
        self.token_id.encode(buf)?;
        self.created_at.encode(buf)?;
        self.revised_lifetime.encode(buf)
    }
}

impl BinaryDecode for ChannelSecurityToken {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            channel_id: u32::decode(buf)?,
            token_id: u32::decode(buf)?,
            created_at: DateTime::decode(buf)?,
            revised_lifetime: u32::decode(buf)?,
        })
    }
}

/// Request to open or renew a secure channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenSecureChannelRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// Client's protocol version.
    pub client_protocol_version: u32,
    /// Issue or renew.
    pub request_type: SecurityTokenRequestType,
    /// Requested security mode.
    pub security_mode: MessageSecurityMode,
    /// Client nonce, empty in mode `None`.
    pub client_nonce: ByteString,
    /// Requested token lifetime, in milliseconds.
    pub requested_lifetime: u32,
}

impl OpenSecureChannelRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 444;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 446;

    /// An issue/renew request in the given mode.
    pub fn new(
        request_type: SecurityTokenRequestType,
        security_mode: MessageSecurityMode,
        client_nonce: ByteString,
        requested_lifetime: u32,
    ) -> Self {
        Self {
            request_header: RequestHeader::default(),
            client_protocol_version: 0,
            request_type,
            security_mode,
            client_nonce,
            requested_lifetime,
        }
    }
}

impl BinaryEncode for OpenSecureChannelRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.client_protocol_version.encode(buf)?;
        (self.request_type as u32).encode(buf)?;
        (self.security_mode as u32).encode(buf)?;
        self.client_nonce.encode(buf)?;
        self.requested_lifetime.encode(buf)
    }
}

impl BinaryDecode for OpenSecureChannelRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let request_header = RequestHeader::decode(buf)?;
        let client_protocol_version = u32::decode(buf)?;
        let raw_type = u32::decode(buf)?;
        let request_type = SecurityTokenRequestType::from_u32(raw_type).ok_or(
            CodecError::InvalidEnumValue {
                name: "SecurityTokenRequestType",
                value: raw_type,
            },
        )?;
        let raw_mode = u32::decode(buf)?;
        let security_mode =
            MessageSecurityMode::from_u32(raw_mode).ok_or(CodecError::InvalidEnumValue {
                name: "MessageSecurityMode",
                value: raw_mode,
            })?;
        Ok(Self {
            request_header,
            client_protocol_version,
            request_type,
            security_mode,
            client_nonce: ByteString::decode(buf)?,
            requested_lifetime: u32::decode(buf)?,
        })
    }
}

/// Response granting a channel security token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenSecureChannelResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// Server's protocol version.
    pub server_protocol_version: u32,
    /// The granted token.
    pub security_token: ChannelSecurityToken,
    /// Server nonce, empty in mode `None`.
    pub server_nonce: ByteString,
}

impl OpenSecureChannelResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 447;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 449;
}

impl BinaryEncode for OpenSecureChannelResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.server_protocol_version.encode(buf)?;
        self.security_token.encode(buf)?;
        self.server_nonce.encode(buf)
    }
}

impl BinaryDecode for OpenSecureChannelResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            server_protocol_version: u32::decode(buf)?,
            security_token: ChannelSecurityToken::decode(buf)?,
            server_nonce: ByteString::decode(buf)?,
        })
    }
}

/// Request to close a secure channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSecureChannelRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
}

impl CloseSecureChannelRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 450;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 452;
}

impl BinaryEncode for CloseSecureChannelRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)
    }
}

impl BinaryDecode for CloseSecureChannelRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
        })
    }
}

/// Response acknowledging a channel close.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSecureChannelResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
}

impl CloseSecureChannelResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 453;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 455;
}

impl BinaryEncode for CloseSecureChannelResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)
    }
}

impl BinaryDecode for CloseSecureChannelResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_open_request_round_trip() {
        let req = OpenSecureChannelRequest::new(
            SecurityTokenRequestType::Issue,
            MessageSecurityMode::None,
            Vec::new(),
            360_000,
        );
        let mut buf = Buffer::new();
        req.encode(&mut buf).unwrap();
        assert_eq!(OpenSecureChannelRequest::decode(&mut buf).unwrap(), req);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_open_response_round_trip() {
        let resp = OpenSecureChannelResponse {
            security_token: ChannelSecurityToken {
                channel_id: 3,
                token_id: 0xDEAD_BEEF,
                created_at: DateTime::from_unix_parts(1_700_000_000, 0),
                revised_lifetime: 360_000,
            },
            ..Default::default()
        };
        let mut buf = Buffer::new();
        resp.encode(&mut buf).unwrap();
        assert_eq!(OpenSecureChannelResponse::decode(&mut buf).unwrap(), resp);
    }

    #[test]
    fn test_invalid_security_mode_rejected() {
        let req = OpenSecureChannelRequest::default();
        let mut buf = Buffer::new();
        req.request_header.encode(&mut buf).unwrap();
        0u32.encode(&mut buf).unwrap(); // protocol version
        0u32.encode(&mut buf).unwrap(); // request type
        9u32.encode(&mut buf).unwrap(); // bogus mode
        assert!(matches!(
            OpenSecureChannelRequest::decode(&mut buf),
            Err(CodecError::InvalidEnumValue {
                name: "MessageSecurityMode",
                value: 9
            })
        ));
    }

    #[test]
    fn test_close_round_trip() {
        let req = CloseSecureChannelRequest::default();
        let mut buf = Buffer::new();
        req.encode(&mut buf).unwrap();
        assert_eq!(CloseSecureChannelRequest::decode(&mut buf).unwrap(), req);
    }
}
