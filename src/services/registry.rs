//! The structure registry: abstract type ids, wire-encoding ids and the
//! match-by-tag service decoder.
//!
//! Every registered structure carries two numeric ids: the abstract
//! type id naming the structure itself and the binary encoding id
//! placed on the wire. Both maps are fixed at compile time and a
//! lookup miss is a decoding error naming the unknown id.

use super::attribute::{ReadRequest, ReadResponse, WriteRequest, WriteResponse};
use super::extension::AnonymousIdentityToken;
use super::header::{RequestHeader, ResponseHeader};
use super::secure_channel::{
    CloseSecureChannelRequest, CloseSecureChannelResponse, OpenSecureChannelRequest,
    OpenSecureChannelResponse,
};
use super::session::{
    ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest, CloseSessionResponse,
    CreateSessionRequest, CreateSessionResponse,
};
use super::view::{TranslateBrowsePathsToNodeIdsRequest, TranslateBrowsePathsToNodeIdsResponse};
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::CodecError;
use crate::types::NodeId;

/// The binary wire-encoding id for an abstract type id.
pub fn encoding_id(type_id: u32) -> Option<u32> {
    match type_id {
        AnonymousIdentityToken::TYPE_ID => Some(AnonymousIdentityToken::ENCODING_ID),
        OpenSecureChannelRequest::TYPE_ID => Some(OpenSecureChannelRequest::ENCODING_ID),
        OpenSecureChannelResponse::TYPE_ID => Some(OpenSecureChannelResponse::ENCODING_ID),
        CloseSecureChannelRequest::TYPE_ID => Some(CloseSecureChannelRequest::ENCODING_ID),
        CloseSecureChannelResponse::TYPE_ID => Some(CloseSecureChannelResponse::ENCODING_ID),
        CreateSessionRequest::TYPE_ID => Some(CreateSessionRequest::ENCODING_ID),
        CreateSessionResponse::TYPE_ID => Some(CreateSessionResponse::ENCODING_ID),
        ActivateSessionRequest::TYPE_ID => Some(ActivateSessionRequest::ENCODING_ID),
        ActivateSessionResponse::TYPE_ID => Some(ActivateSessionResponse::ENCODING_ID),
        CloseSessionRequest::TYPE_ID => Some(CloseSessionRequest::ENCODING_ID),
        CloseSessionResponse::TYPE_ID => Some(CloseSessionResponse::ENCODING_ID),
        ReadRequest::TYPE_ID => Some(ReadRequest::ENCODING_ID),
        ReadResponse::TYPE_ID => Some(ReadResponse::ENCODING_ID),
        WriteRequest::TYPE_ID => Some(WriteRequest::ENCODING_ID),
        WriteResponse::TYPE_ID => Some(WriteResponse::ENCODING_ID),
        TranslateBrowsePathsToNodeIdsRequest::TYPE_ID => {
            Some(TranslateBrowsePathsToNodeIdsRequest::ENCODING_ID)
        }
        TranslateBrowsePathsToNodeIdsResponse::TYPE_ID => {
            Some(TranslateBrowsePathsToNodeIdsResponse::ENCODING_ID)
        }
        _ => None,
    }
}

/// The abstract type id for a binary wire-encoding id.
pub fn type_id(encoding_id: u32) -> Option<u32> {
    match encoding_id {
        AnonymousIdentityToken::ENCODING_ID => Some(AnonymousIdentityToken::TYPE_ID),
        OpenSecureChannelRequest::ENCODING_ID => Some(OpenSecureChannelRequest::TYPE_ID),
        OpenSecureChannelResponse::ENCODING_ID => Some(OpenSecureChannelResponse::TYPE_ID),
        CloseSecureChannelRequest::ENCODING_ID => Some(CloseSecureChannelRequest::TYPE_ID),
        CloseSecureChannelResponse::ENCODING_ID => Some(CloseSecureChannelResponse::TYPE_ID),
        CreateSessionRequest::ENCODING_ID => Some(CreateSessionRequest::TYPE_ID),
        CreateSessionResponse::ENCODING_ID => Some(CreateSessionResponse::TYPE_ID),
        ActivateSessionRequest::ENCODING_ID => Some(ActivateSessionRequest::TYPE_ID),
        ActivateSessionResponse::ENCODING_ID => Some(ActivateSessionResponse::TYPE_ID),
        CloseSessionRequest::ENCODING_ID => Some(CloseSessionRequest::TYPE_ID),
        CloseSessionResponse::ENCODING_ID => Some(CloseSessionResponse::TYPE_ID),
        ReadRequest::ENCODING_ID => Some(ReadRequest::TYPE_ID),
        ReadResponse::ENCODING_ID => Some(ReadResponse::TYPE_ID),
        WriteRequest::ENCODING_ID => Some(WriteRequest::TYPE_ID),
        WriteResponse::ENCODING_ID => Some(WriteResponse::TYPE_ID),
        TranslateBrowsePathsToNodeIdsRequest::ENCODING_ID => {
            Some(TranslateBrowsePathsToNodeIdsRequest::TYPE_ID)
        }
        TranslateBrowsePathsToNodeIdsResponse::ENCODING_ID => {
            Some(TranslateBrowsePathsToNodeIdsResponse::TYPE_ID)
        }
        _ => None,
    }
}

/// The sum of every service message, keyed by abstract type id.
///
/// This replaces per-structure virtual dispatch: the channel layer
/// decodes a body by reading its leading NodeId, mapping the encoding
/// id back to the abstract id and matching here.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ServiceMessage {
    OpenSecureChannelRequest(OpenSecureChannelRequest),
    OpenSecureChannelResponse(OpenSecureChannelResponse),
    CloseSecureChannelRequest(CloseSecureChannelRequest),
    CloseSecureChannelResponse(CloseSecureChannelResponse),
    CreateSessionRequest(CreateSessionRequest),
    CreateSessionResponse(CreateSessionResponse),
    ActivateSessionRequest(ActivateSessionRequest),
    ActivateSessionResponse(ActivateSessionResponse),
    CloseSessionRequest(CloseSessionRequest),
    CloseSessionResponse(CloseSessionResponse),
    ReadRequest(ReadRequest),
    ReadResponse(ReadResponse),
    WriteRequest(WriteRequest),
    WriteResponse(WriteResponse),
    TranslateBrowsePathsToNodeIdsRequest(TranslateBrowsePathsToNodeIdsRequest),
    TranslateBrowsePathsToNodeIdsResponse(TranslateBrowsePathsToNodeIdsResponse),
}

macro_rules! for_each_variant {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            ServiceMessage::OpenSecureChannelRequest($inner) => $body,
            ServiceMessage::OpenSecureChannelResponse($inner) => $body,
            ServiceMessage::CloseSecureChannelRequest($inner) => $body,
            ServiceMessage::CloseSecureChannelResponse($inner) => $body,
            ServiceMessage::CreateSessionRequest($inner) => $body,
            ServiceMessage::CreateSessionResponse($inner) => $body,
            ServiceMessage::CloseSessionRequest($inner) => $body,
            ServiceMessage::CloseSessionResponse($inner) => $body,
            ServiceMessage::ActivateSessionRequest($inner) => $body,
            ServiceMessage::ActivateSessionResponse($inner) => $body,
            ServiceMessage::ReadRequest($inner) => $body,
            ServiceMessage::ReadResponse($inner) => $body,
            ServiceMessage::WriteRequest($inner) => $body,
            ServiceMessage::WriteResponse($inner) => $body,
            ServiceMessage::TranslateBrowsePathsToNodeIdsRequest($inner) => $body,
            ServiceMessage::TranslateBrowsePathsToNodeIdsResponse($inner) => $body,
        }
    };
}

impl ServiceMessage {
    /// The abstract type id of the carried message.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::OpenSecureChannelRequest(_) => OpenSecureChannelRequest::TYPE_ID,
            Self::OpenSecureChannelResponse(_) => OpenSecureChannelResponse::TYPE_ID,
            Self::CloseSecureChannelRequest(_) => CloseSecureChannelRequest::TYPE_ID,
            Self::CloseSecureChannelResponse(_) => CloseSecureChannelResponse::TYPE_ID,
            Self::CreateSessionRequest(_) => CreateSessionRequest::TYPE_ID,
            Self::CreateSessionResponse(_) => CreateSessionResponse::TYPE_ID,
            Self::ActivateSessionRequest(_) => ActivateSessionRequest::TYPE_ID,
            Self::ActivateSessionResponse(_) => ActivateSessionResponse::TYPE_ID,
            Self::CloseSessionRequest(_) => CloseSessionRequest::TYPE_ID,
            Self::CloseSessionResponse(_) => CloseSessionResponse::TYPE_ID,
            Self::ReadRequest(_) => ReadRequest::TYPE_ID,
            Self::ReadResponse(_) => ReadResponse::TYPE_ID,
            Self::WriteRequest(_) => WriteRequest::TYPE_ID,
            Self::WriteResponse(_) => WriteResponse::TYPE_ID,
            Self::TranslateBrowsePathsToNodeIdsRequest(_) => {
                TranslateBrowsePathsToNodeIdsRequest::TYPE_ID
            }
            Self::TranslateBrowsePathsToNodeIdsResponse(_) => {
                TranslateBrowsePathsToNodeIdsResponse::TYPE_ID
            }
        }
    }

    /// The message's name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenSecureChannelRequest(_) => "OpenSecureChannelRequest",
            Self::OpenSecureChannelResponse(_) => "OpenSecureChannelResponse",
            Self::CloseSecureChannelRequest(_) => "CloseSecureChannelRequest",
            Self::CloseSecureChannelResponse(_) => "CloseSecureChannelResponse",
            Self::CreateSessionRequest(_) => "CreateSessionRequest",
            Self::CreateSessionResponse(_) => "CreateSessionResponse",
            Self::ActivateSessionRequest(_) => "ActivateSessionRequest",
            Self::ActivateSessionResponse(_) => "ActivateSessionResponse",
            Self::CloseSessionRequest(_) => "CloseSessionRequest",
            Self::CloseSessionResponse(_) => "CloseSessionResponse",
            Self::ReadRequest(_) => "ReadRequest",
            Self::ReadResponse(_) => "ReadResponse",
            Self::WriteRequest(_) => "WriteRequest",
            Self::WriteResponse(_) => "WriteResponse",
            Self::TranslateBrowsePathsToNodeIdsRequest(_) => "TranslateBrowsePathsToNodeIdsRequest",
            Self::TranslateBrowsePathsToNodeIdsResponse(_) => {
                "TranslateBrowsePathsToNodeIdsResponse"
            }
        }
    }

    /// The request header, if this message is a request.
    pub fn request_header(&self) -> Option<&RequestHeader> {
        match self {
            Self::OpenSecureChannelRequest(m) => Some(&m.request_header),
            Self::CloseSecureChannelRequest(m) => Some(&m.request_header),
            Self::CreateSessionRequest(m) => Some(&m.request_header),
            Self::ActivateSessionRequest(m) => Some(&m.request_header),
            Self::CloseSessionRequest(m) => Some(&m.request_header),
            Self::ReadRequest(m) => Some(&m.request_header),
            Self::WriteRequest(m) => Some(&m.request_header),
            Self::TranslateBrowsePathsToNodeIdsRequest(m) => Some(&m.request_header),
            _ => None,
        }
    }

    /// Mutable access to the request header, if this is a request.
    pub fn request_header_mut(&mut self) -> Option<&mut RequestHeader> {
        match self {
            Self::OpenSecureChannelRequest(m) => Some(&mut m.request_header),
            Self::CloseSecureChannelRequest(m) => Some(&mut m.request_header),
            Self::CreateSessionRequest(m) => Some(&mut m.request_header),
            Self::ActivateSessionRequest(m) => Some(&mut m.request_header),
            Self::CloseSessionRequest(m) => Some(&mut m.request_header),
            Self::ReadRequest(m) => Some(&mut m.request_header),
            Self::WriteRequest(m) => Some(&mut m.request_header),
            Self::TranslateBrowsePathsToNodeIdsRequest(m) => Some(&mut m.request_header),
            _ => None,
        }
    }

    /// The response header, if this message is a response.
    pub fn response_header(&self) -> Option<&ResponseHeader> {
        match self {
            Self::OpenSecureChannelResponse(m) => Some(&m.response_header),
            Self::CloseSecureChannelResponse(m) => Some(&m.response_header),
            Self::CreateSessionResponse(m) => Some(&m.response_header),
            Self::ActivateSessionResponse(m) => Some(&m.response_header),
            Self::CloseSessionResponse(m) => Some(&m.response_header),
            Self::ReadResponse(m) => Some(&m.response_header),
            Self::WriteResponse(m) => Some(&m.response_header),
            Self::TranslateBrowsePathsToNodeIdsResponse(m) => Some(&m.response_header),
            _ => None,
        }
    }

    /// Mutable access to the response header, if this is a response.
    pub fn response_header_mut(&mut self) -> Option<&mut ResponseHeader> {
        match self {
            Self::OpenSecureChannelResponse(m) => Some(&mut m.response_header),
            Self::CloseSecureChannelResponse(m) => Some(&mut m.response_header),
            Self::CreateSessionResponse(m) => Some(&mut m.response_header),
            Self::ActivateSessionResponse(m) => Some(&mut m.response_header),
            Self::CloseSessionResponse(m) => Some(&mut m.response_header),
            Self::ReadResponse(m) => Some(&mut m.response_header),
            Self::WriteResponse(m) => Some(&mut m.response_header),
            Self::TranslateBrowsePathsToNodeIdsResponse(m) => Some(&mut m.response_header),
            _ => None,
        }
    }

    /// Whether this message carries a request header.
    pub fn is_request(&self) -> bool {
        self.request_header().is_some()
    }

    /// Whether this message carries a response header.
    pub fn is_response(&self) -> bool {
        self.response_header().is_some()
    }

    /// Encode the message body: the binary-encoding NodeId of the
    /// service, then its fields in declared order.
    pub fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        let type_id = self.type_id();
        let encoding_id = encoding_id(type_id).ok_or(CodecError::UnknownTypeId(type_id))?;
        NodeId::numeric(encoding_id).encode(buf)?;
        for_each_variant!(self, inner => inner.encode(buf))
    }

    /// Decode a message body: the leading NodeId selects the concrete
    /// type through the reverse registry.
    pub fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let id = NodeId::decode(buf)?;
        let Some((0, encoding)) = id.as_numeric() else {
            return Err(CodecError::NonStandardTypeId);
        };
        let type_id = type_id(encoding).ok_or(CodecError::UnknownEncodingId(encoding))?;
        Self::decode_body(type_id, buf)
    }

    /// Decode the fields of the message with the given abstract type id.
    pub fn decode_body<B: ReadBuffer + ?Sized>(
        type_id: u32,
        buf: &mut B,
    ) -> Result<Self, CodecError> {
        match type_id {
            OpenSecureChannelRequest::TYPE_ID => Ok(Self::OpenSecureChannelRequest(
                OpenSecureChannelRequest::decode(buf)?,
            )),
            OpenSecureChannelResponse::TYPE_ID => Ok(Self::OpenSecureChannelResponse(
                OpenSecureChannelResponse::decode(buf)?,
            )),
            CloseSecureChannelRequest::TYPE_ID => Ok(Self::CloseSecureChannelRequest(
                CloseSecureChannelRequest::decode(buf)?,
            )),
            CloseSecureChannelResponse::TYPE_ID => Ok(Self::CloseSecureChannelResponse(
                CloseSecureChannelResponse::decode(buf)?,
            )),
            CreateSessionRequest::TYPE_ID => {
                Ok(Self::CreateSessionRequest(CreateSessionRequest::decode(buf)?))
            }
            CreateSessionResponse::TYPE_ID => Ok(Self::CreateSessionResponse(
                CreateSessionResponse::decode(buf)?,
            )),
            ActivateSessionRequest::TYPE_ID => Ok(Self::ActivateSessionRequest(
                ActivateSessionRequest::decode(buf)?,
            )),
            ActivateSessionResponse::TYPE_ID => Ok(Self::ActivateSessionResponse(
                ActivateSessionResponse::decode(buf)?,
            )),
            CloseSessionRequest::TYPE_ID => {
                Ok(Self::CloseSessionRequest(CloseSessionRequest::decode(buf)?))
            }
            CloseSessionResponse::TYPE_ID => {
                Ok(Self::CloseSessionResponse(CloseSessionResponse::decode(buf)?))
            }
            ReadRequest::TYPE_ID => Ok(Self::ReadRequest(ReadRequest::decode(buf)?)),
            ReadResponse::TYPE_ID => Ok(Self::ReadResponse(ReadResponse::decode(buf)?)),
            WriteRequest::TYPE_ID => Ok(Self::WriteRequest(WriteRequest::decode(buf)?)),
            WriteResponse::TYPE_ID => Ok(Self::WriteResponse(WriteResponse::decode(buf)?)),
            TranslateBrowsePathsToNodeIdsRequest::TYPE_ID => {
                Ok(Self::TranslateBrowsePathsToNodeIdsRequest(
                    TranslateBrowsePathsToNodeIdsRequest::decode(buf)?,
                ))
            }
            TranslateBrowsePathsToNodeIdsResponse::TYPE_ID => {
                Ok(Self::TranslateBrowsePathsToNodeIdsResponse(
                    TranslateBrowsePathsToNodeIdsResponse::decode(buf)?,
                ))
            }
            other => Err(CodecError::UnknownTypeId(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;
    use crate::services::attribute::{AttributeId, ReadValueId, TimestampsToReturn};

    const ALL_TYPE_IDS: &[u32] = &[
        AnonymousIdentityToken::TYPE_ID,
        OpenSecureChannelRequest::TYPE_ID,
        OpenSecureChannelResponse::TYPE_ID,
        CloseSecureChannelRequest::TYPE_ID,
        CloseSecureChannelResponse::TYPE_ID,
        CreateSessionRequest::TYPE_ID,
        CreateSessionResponse::TYPE_ID,
        ActivateSessionRequest::TYPE_ID,
        ActivateSessionResponse::TYPE_ID,
        CloseSessionRequest::TYPE_ID,
        CloseSessionResponse::TYPE_ID,
        ReadRequest::TYPE_ID,
        ReadResponse::TYPE_ID,
        WriteRequest::TYPE_ID,
        WriteResponse::TYPE_ID,
        TranslateBrowsePathsToNodeIdsRequest::TYPE_ID,
        TranslateBrowsePathsToNodeIdsResponse::TYPE_ID,
    ];

    #[test]
    fn test_id_maps_are_inverse() {
        for &abstract_id in ALL_TYPE_IDS {
            let wire = encoding_id(abstract_id).unwrap();
            assert_eq!(type_id(wire), Some(abstract_id));
        }
    }

    #[test]
    fn test_canonical_wire_ids() {
        assert_eq!(encoding_id(OpenSecureChannelRequest::TYPE_ID), Some(446));
        assert_eq!(encoding_id(OpenSecureChannelResponse::TYPE_ID), Some(449));
        assert_eq!(encoding_id(CloseSecureChannelRequest::TYPE_ID), Some(452));
        assert_eq!(encoding_id(CreateSessionRequest::TYPE_ID), Some(461));
        assert_eq!(encoding_id(CreateSessionResponse::TYPE_ID), Some(464));
        assert_eq!(encoding_id(ActivateSessionRequest::TYPE_ID), Some(467));
        assert_eq!(encoding_id(CloseSessionRequest::TYPE_ID), Some(473));
        assert_eq!(encoding_id(ReadRequest::TYPE_ID), Some(631));
        assert_eq!(encoding_id(ReadResponse::TYPE_ID), Some(634));
        assert_eq!(encoding_id(WriteRequest::TYPE_ID), Some(673));
        assert_eq!(encoding_id(WriteResponse::TYPE_ID), Some(676));
        assert_eq!(
            encoding_id(TranslateBrowsePathsToNodeIdsRequest::TYPE_ID),
            Some(554)
        );
    }

    #[test]
    fn test_unknown_ids_fail() {
        assert_eq!(encoding_id(9999), None);
        assert_eq!(type_id(9999), None);

        let mut buf = Buffer::new();
        NodeId::numeric(9999).encode(&mut buf).unwrap();
        assert_eq!(
            ServiceMessage::decode(&mut buf),
            Err(CodecError::UnknownEncodingId(9999))
        );
    }

    #[test]
    fn test_message_round_trip() {
        let msg = ServiceMessage::ReadRequest(ReadRequest {
            max_age: 1500.0,
            timestamps_to_return: TimestampsToReturn::Server,
            nodes_to_read: vec![ReadValueId::new(NodeId::string(1, "I1"), AttributeId::Value)],
            ..Default::default()
        });

        let mut buf = Buffer::new();
        msg.encode(&mut buf).unwrap();
        assert_eq!(ServiceMessage::decode(&mut buf).unwrap(), msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_body_leads_with_encoding_node_id() {
        let msg =
            ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default());
        let mut buf = Buffer::new();
        msg.encode(&mut buf).unwrap();
        let id = NodeId::decode(&mut buf).unwrap();
        assert_eq!(id, NodeId::numeric(452));
    }

    #[test]
    fn test_header_accessors() {
        let mut req = ServiceMessage::ReadRequest(ReadRequest::default());
        assert!(req.is_request());
        assert!(!req.is_response());
        req.request_header_mut().unwrap().request_handle = 5;
        assert_eq!(req.request_header().unwrap().request_handle, 5);

        let resp = ServiceMessage::ReadResponse(ReadResponse::default());
        assert!(resp.is_response());
        assert!(resp.request_header().is_none());
        assert_eq!(resp.name(), "ReadResponse");
    }
}
