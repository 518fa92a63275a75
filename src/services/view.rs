//! TranslateBrowsePathsToNodeIds service.

use super::header::{DiagnosticInfo, RequestHeader, ResponseHeader};
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};
use crate::types::{NodeId, QualifiedName};

/// One step of a relative path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelativePathElement {
    /// Reference type to follow.
    pub reference_type_id: NodeId,
    /// Follow the reference against its direction.
    pub is_inverse: bool,
    /// Also follow subtypes of the reference type.
    pub include_subtypes: bool,
    /// Browse name the target must carry.
    pub target_name: QualifiedName,
}

impl BinaryEncode for RelativePathElement {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.reference_type_id.encode(buf)?;
        self.is_inverse.encode(buf)?;
        self.include_subtypes.encode(buf)?;
        self.target_name.encode(buf)
    }
}

impl BinaryDecode for RelativePathElement {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            reference_type_id: NodeId::decode(buf)?,
            is_inverse: bool::decode(buf)?,
            include_subtypes: bool::decode(buf)?,
            target_name: QualifiedName::decode(buf)?,
        })
    }
}

/// A sequence of path steps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelativePath {
    /// The steps, walked in order.
    pub elements: Vec<RelativePathElement>,
}

impl BinaryEncode for RelativePath {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.elements.encode(buf)
    }
}

impl BinaryDecode for RelativePath {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            elements: Vec::decode(buf)?,
        })
    }
}

/// A relative path anchored at a starting node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePath {
    /// Where the walk begins.
    pub starting_node: NodeId,
    /// The path to walk.
    pub relative_path: RelativePath,
}

impl BinaryEncode for BrowsePath {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.starting_node.encode(buf)?;
        self.relative_path.encode(buf)
    }
}

impl BinaryDecode for BrowsePath {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            starting_node: NodeId::decode(buf)?,
            relative_path: RelativePath::decode(buf)?,
        })
    }
}

/// Request to resolve browse paths into node ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateBrowsePathsToNodeIdsRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// The paths to resolve, answered in order.
    pub browse_paths: Vec<BrowsePath>,
}

impl TranslateBrowsePathsToNodeIdsRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 552;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 554;
}

impl BinaryEncode for TranslateBrowsePathsToNodeIdsRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.browse_paths.encode(buf)
    }
}

impl BinaryDecode for TranslateBrowsePathsToNodeIdsRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
            browse_paths: Vec::decode(buf)?,
        })
    }
}

/// One node a browse path resolved to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathTarget {
    /// The resolved node.
    pub target_id: NodeId,
    /// Index of the first unprocessed path element, `u32::MAX` when
    /// the whole path matched.
    pub remaining_path_index: u32,
}

impl BinaryEncode for BrowsePathTarget {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.target_id.encode(buf)?;
        self.remaining_path_index.encode(buf)
    }
}

impl BinaryDecode for BrowsePathTarget {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            target_id: NodeId::decode(buf)?,
            remaining_path_index: u32::decode(buf)?,
        })
    }
}

/// Outcome of resolving one browse path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowsePathResult {
    /// Outcome of the walk.
    pub status_code: StatusCode,
    /// Nodes the path resolved to.
    pub targets: Vec<BrowsePathTarget>,
}

impl BinaryEncode for BrowsePathResult {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.status_code.encode(buf)?;
        self.targets.encode(buf)
    }
}

impl BinaryDecode for BrowsePathResult {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            status_code: StatusCode::decode(buf)?,
            targets: Vec::decode(buf)?,
        })
    }
}

/// Response carrying one result per browse path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslateBrowsePathsToNodeIdsResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// One result per input, in input order.
    pub results: Vec<BrowsePathResult>,
    /// Diagnostics per input.
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl TranslateBrowsePathsToNodeIdsResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 555;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 557;
}

impl BinaryEncode for TranslateBrowsePathsToNodeIdsResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.results.encode(buf)?;
        self.diagnostic_infos.encode(buf)
    }
}

impl BinaryDecode for TranslateBrowsePathsToNodeIdsResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            results: Vec::decode(buf)?,
            diagnostic_infos: Vec::decode(buf)?,
        })
    }
}
