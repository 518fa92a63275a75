//! Security and sequence headers carried by every chunk.

use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::constants::SECURITY_POLICY_NONE;
use crate::core::CodecError;
use crate::types::ByteString;

/// Security header on OPN chunks.
///
/// In security mode `None` the policy URI names the null policy and
/// both certificate fields stay empty; this is where certificates
/// would attach in the signed modes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AsymmetricSecurityHeader {
    /// URI of the security policy in force.
    pub security_policy_uri: String,
    /// Sender certificate, empty in mode `None`.
    pub sender_certificate: ByteString,
    /// Thumbprint of the receiver's certificate, empty in mode `None`.
    pub receiver_certificate_thumbprint: ByteString,
}

impl AsymmetricSecurityHeader {
    /// The header for security mode `None`.
    pub fn none() -> Self {
        Self {
            security_policy_uri: SECURITY_POLICY_NONE.to_string(),
            sender_certificate: ByteString::new(),
            receiver_certificate_thumbprint: ByteString::new(),
        }
    }
}

impl BinaryEncode for AsymmetricSecurityHeader {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.security_policy_uri.encode(buf)?;
        self.sender_certificate.encode(buf)?;
        self.receiver_certificate_thumbprint.encode(buf)
    }
}

impl BinaryDecode for AsymmetricSecurityHeader {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            security_policy_uri: String::decode(buf)?,
            sender_certificate: ByteString::decode(buf)?,
            receiver_certificate_thumbprint: ByteString::decode(buf)?,
        })
    }
}

/// Security header on MSG and CLO chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymmetricSecurityHeader {
    /// The channel security token in force.
    pub token_id: u32,
}

impl BinaryEncode for SymmetricSecurityHeader {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.token_id.encode(buf)
    }
}

impl BinaryDecode for SymmetricSecurityHeader {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            token_id: u32::decode(buf)?,
        })
    }
}

/// Per-chunk ordering and correlation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceHeader {
    /// Strictly increasing per channel.
    pub sequence_number: u32,
    /// Constant across all chunks of one logical message.
    pub request_id: u32,
}

impl SequenceHeader {
    /// Serialized header size.
    pub const SIZE: usize = crate::core::constants::SEQUENCE_HEADER_SIZE;
}

impl BinaryEncode for SequenceHeader {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.sequence_number.encode(buf)?;
        self.request_id.encode(buf)
    }
}

impl BinaryDecode for SequenceHeader {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            sequence_number: u32::decode(buf)?,
            request_id: u32::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_asymmetric_none_round_trip() {
        let header = AsymmetricSecurityHeader::none();
        assert_eq!(
            header.security_policy_uri,
            "http://opcfoundation.org/UA/SecurityPolicy#None"
        );
        let mut buf = Buffer::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(AsymmetricSecurityHeader::decode(&mut buf).unwrap(), header);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_symmetric_round_trip() {
        let header = SymmetricSecurityHeader { token_id: 0xCAFE };
        let mut buf = Buffer::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 4);
        assert_eq!(SymmetricSecurityHeader::decode(&mut buf).unwrap(), header);
    }

    #[test]
    fn test_sequence_header_round_trip() {
        let header = SequenceHeader {
            sequence_number: 3,
            request_id: 9,
        };
        let mut buf = Buffer::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), SequenceHeader::SIZE);
        assert_eq!(SequenceHeader::decode(&mut buf).unwrap(), header);
    }
}
