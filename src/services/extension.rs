//! The polymorphic structure envelope.

use super::registry;
use crate::codec::{BinaryDecode, BinaryEncode, Buffer, ReadBuffer, WriteBuffer};
use crate::core::constants::ANONYMOUS_POLICY_ID;
use crate::core::CodecError;
use crate::types::NodeId;

/// An identity token asserting no identity.
///
/// Sent by default when a session is activated without explicit
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousIdentityToken {
    /// The endpoint policy this token answers.
    pub policy_id: String,
}

impl AnonymousIdentityToken {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 319;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 321;
}

impl Default for AnonymousIdentityToken {
    fn default() -> Self {
        Self {
            policy_id: ANONYMOUS_POLICY_ID.to_string(),
        }
    }
}

impl BinaryEncode for AnonymousIdentityToken {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.policy_id.encode(buf)
    }
}

impl BinaryDecode for AnonymousIdentityToken {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            policy_id: String::decode(buf)?,
        })
    }
}

/// The set of structures an [`ExtensionObject`] can carry.
///
/// One variant per registered inner type, keyed by its abstract type
/// id; decoding an unregistered id fails with a decoding error rather
/// than preserving the body opaquely.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionBody {
    /// An anonymous identity token.
    AnonymousIdentityToken(AnonymousIdentityToken),
}

impl ExtensionBody {
    /// Abstract type id of the carried structure.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::AnonymousIdentityToken(_) => AnonymousIdentityToken::TYPE_ID,
        }
    }

    fn encode_fields<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        match self {
            Self::AnonymousIdentityToken(token) => token.encode(buf),
        }
    }

    fn decode_fields<B: ReadBuffer + ?Sized>(
        type_id: u32,
        buf: &mut B,
    ) -> Result<Self, CodecError> {
        match type_id {
            AnonymousIdentityToken::TYPE_ID => Ok(Self::AnonymousIdentityToken(
                AnonymousIdentityToken::decode(buf)?,
            )),
            other => Err(CodecError::UnknownTypeId(other)),
        }
    }
}

/// A structure wrapped with its type identity.
///
/// The wire form is the inner structure's binary-encoding NodeId, an
/// encoding byte (0 none, 1 binary body), and for binary bodies a u32
/// length prefix followed by the serialized fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionObject {
    /// The carried structure, if any.
    pub body: Option<ExtensionBody>,
}

impl ExtensionObject {
    /// An envelope carrying nothing.
    pub const fn empty() -> Self {
        Self { body: None }
    }

    /// An envelope carrying the default anonymous identity token.
    pub fn anonymous() -> Self {
        Self {
            body: Some(ExtensionBody::AnonymousIdentityToken(
                AnonymousIdentityToken::default(),
            )),
        }
    }
}

impl BinaryEncode for ExtensionObject {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        let Some(body) = &self.body else {
            NodeId::NULL.encode(buf)?;
            return 0u8.encode(buf);
        };

        let type_id = body.type_id();
        let encoding_id = registry::encoding_id(type_id).ok_or(CodecError::UnknownTypeId(type_id))?;

        // Serialize into a staging buffer to learn the body length.
        let mut staged = Buffer::new();
        body.encode_fields(&mut staged)?;

        NodeId::numeric(encoding_id).encode(buf)?;
        1u8.encode(buf)?;
        (staged.len() as u32).encode(buf)?;
        buf.move_all(&mut staged);
        Ok(())
    }
}

impl BinaryDecode for ExtensionObject {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let id = NodeId::decode(buf)?;
        let encoding = buf.read_byte()?;

        if id.is_null() && encoding == 0 {
            return Ok(Self::empty());
        }
        if encoding != 1 {
            return Err(CodecError::UnsupportedExtensionObject(encoding));
        }
        let Some((0, encoding_id)) = id.as_numeric() else {
            return Err(CodecError::NonStandardTypeId);
        };
        let type_id =
            registry::type_id(encoding_id).ok_or(CodecError::UnknownEncodingId(encoding_id))?;

        let length = u32::decode(buf)? as usize;
        let mut body_buf = Buffer::from(buf.read_vec(length)?);
        let body = ExtensionBody::decode_fields(type_id, &mut body_buf)?;
        if !body_buf.is_empty() {
            return Err(CodecError::TrailingBytes(body_buf.len()));
        }
        Ok(Self { body: Some(body) })
    }
}
