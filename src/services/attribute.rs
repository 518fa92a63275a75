//! Read and Write services.

use super::header::{DiagnosticInfo, RequestHeader, ResponseHeader};
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};
use crate::types::{DataValue, NodeId, QualifiedName};

/// The attribute slots a node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeId {
    /// The node's own id.
    NodeId = 1,
    /// The node's class.
    NodeClass = 2,
    /// Name used when browsing.
    BrowseName = 3,
    /// Name shown to operators.
    DisplayName = 4,
    /// Free-text description.
    Description = 5,
    /// Which attributes are writable at all.
    WriteMask = 6,
    /// Which attributes this user may write.
    UserWriteMask = 7,
    /// Which events the node emits.
    EventNotifier = 12,
    /// The current value (variables only).
    Value = 13,
    /// Data type of the value.
    DataType = 14,
    /// Scalar or array rank of the value.
    ValueRank = 15,
    /// Array dimensions of the value.
    ArrayDimensions = 16,
    /// Read/write capability of the value.
    AccessLevel = 17,
    /// Read/write capability for this user.
    UserAccessLevel = 18,
    /// Fastest supported sampling interval, in milliseconds.
    MinimumSamplingInterval = 19,
    /// Whether history is collected.
    Historizing = 20,
}

impl AttributeId {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::NodeId),
            2 => Some(Self::NodeClass),
            3 => Some(Self::BrowseName),
            4 => Some(Self::DisplayName),
            5 => Some(Self::Description),
            6 => Some(Self::WriteMask),
            7 => Some(Self::UserWriteMask),
            12 => Some(Self::EventNotifier),
            13 => Some(Self::Value),
            14 => Some(Self::DataType),
            15 => Some(Self::ValueRank),
            16 => Some(Self::ArrayDimensions),
            17 => Some(Self::AccessLevel),
            18 => Some(Self::UserAccessLevel),
            19 => Some(Self::MinimumSamplingInterval),
            20 => Some(Self::Historizing),
            _ => None,
        }
    }

    /// The wire value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Which timestamps a Read response attaches to each result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum TimestampsToReturn {
    /// Source timestamps only.
    #[default]
    Source = 0,
    /// Server timestamps only.
    Server = 1,
    /// Both timestamps.
    Both = 2,
    /// No timestamps.
    Neither = 3,
}

impl TimestampsToReturn {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Source),
            1 => Some(Self::Server),
            2 => Some(Self::Both),
            3 => Some(Self::Neither),
            _ => None,
        }
    }
}

/// One attribute to read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadValueId {
    /// The node to read from.
    pub node_id: NodeId,
    /// The attribute slot, a raw [`AttributeId`] value.
    pub attribute_id: u32,
    /// Sub-range of an array value, empty for the whole value.
    pub index_range: String,
    /// Requested wire encoding, empty for the default.
    pub data_encoding: QualifiedName,
}

impl ReadValueId {
    /// Read `attribute` of `node_id`.
    pub fn new(node_id: NodeId, attribute: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id: attribute.as_u32(),
            ..Self::default()
        }
    }
}

impl BinaryEncode for ReadValueId {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.node_id.encode(buf)?;
        self.attribute_id.encode(buf)?;
        self.index_range.encode(buf)?;
        self.data_encoding.encode(buf)
    }
}

impl BinaryDecode for ReadValueId {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: NodeId::decode(buf)?,
            attribute_id: u32::decode(buf)?,
            index_range: String::decode(buf)?,
            data_encoding: QualifiedName::decode(buf)?,
        })
    }
}

/// Request to read a batch of attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// Oldest acceptable cached value, in milliseconds.
    pub max_age: f64,
    /// Timestamps to attach to each result.
    pub timestamps_to_return: TimestampsToReturn,
    /// The attributes to read, answered in order.
    pub nodes_to_read: Vec<ReadValueId>,
}

impl ReadRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 629;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 631;
}

impl BinaryEncode for ReadRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.max_age.encode(buf)?;
        (self.timestamps_to_return as u32).encode(buf)?;
        self.nodes_to_read.encode(buf)
    }
}

impl BinaryDecode for ReadRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let request_header = RequestHeader::decode(buf)?;
        let max_age = f64::decode(buf)?;
        let raw = u32::decode(buf)?;
        let timestamps_to_return =
            TimestampsToReturn::from_u32(raw).ok_or(CodecError::InvalidEnumValue {
                name: "TimestampsToReturn",
                value: raw,
            })?;
        Ok(Self {
            request_header,
            max_age,
            timestamps_to_return,
            nodes_to_read: Vec::decode(buf)?,
        })
    }
}

/// Response carrying one [`DataValue`] per attribute read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// One result per input, in input order.
    pub results: Vec<DataValue>,
    /// Diagnostics per input.
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl ReadResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 632;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 634;
}

impl BinaryEncode for ReadResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.results.encode(buf)?;
        self.diagnostic_infos.encode(buf)
    }
}

impl BinaryDecode for ReadResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            results: Vec::decode(buf)?,
            diagnostic_infos: Vec::decode(buf)?,
        })
    }
}

/// One attribute to write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteValue {
    /// The node to write to.
    pub node_id: NodeId,
    /// The attribute slot, a raw [`AttributeId`] value.
    pub attribute_id: u32,
    /// Sub-range of an array value, empty for the whole value.
    pub index_range: String,
    /// The value to write.
    pub value: DataValue,
}

impl WriteValue {
    /// Write `value` to `attribute` of `node_id`.
    pub fn new(node_id: NodeId, attribute: AttributeId, value: DataValue) -> Self {
        Self {
            node_id,
            attribute_id: attribute.as_u32(),
            index_range: String::new(),
            value,
        }
    }
}

impl BinaryEncode for WriteValue {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.node_id.encode(buf)?;
        self.attribute_id.encode(buf)?;
        self.index_range.encode(buf)?;
        self.value.encode(buf)
    }
}

impl BinaryDecode for WriteValue {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: NodeId::decode(buf)?,
            attribute_id: u32::decode(buf)?,
            index_range: String::decode(buf)?,
            value: DataValue::decode(buf)?,
        })
    }
}

/// Request to write a batch of attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// The attributes to write, answered in order.
    pub nodes_to_write: Vec<WriteValue>,
}

impl WriteRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 671;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 673;
}

impl BinaryEncode for WriteRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.nodes_to_write.encode(buf)
    }
}

impl BinaryDecode for WriteRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
            nodes_to_write: Vec::decode(buf)?,
        })
    }
}

/// Response carrying one status per attribute written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// One status per input, in input order.
    pub results: Vec<StatusCode>,
    /// Diagnostics per input.
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl WriteResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 674;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 676;
}

impl BinaryEncode for WriteResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.results.encode(buf)?;
        self.diagnostic_infos.encode(buf)
    }
}

impl BinaryDecode for WriteResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            results: Vec::decode(buf)?,
            diagnostic_infos: Vec::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;
    use crate::types::Variant;

    fn round_trip<T: BinaryEncode + BinaryDecode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Buffer::new();
        value.encode(&mut buf).unwrap();
        assert_eq!(T::decode(&mut buf).unwrap(), value);
        assert!(buf.is_empty(), "decoder left trailing bytes");
    }

    #[test]
    fn test_read_round_trip() {
        round_trip(ReadRequest {
            max_age: 1500.0,
            timestamps_to_return: TimestampsToReturn::Server,
            nodes_to_read: vec![ReadValueId::new(
                NodeId::string(1, "I1"),
                AttributeId::Value,
            )],
            ..Default::default()
        });

        round_trip(ReadResponse {
            results: vec![
                DataValue::of(Variant::Boolean(true)),
                DataValue::of_status(StatusCode::BAD_NODE_ID_UNKNOWN),
            ],
            ..Default::default()
        });
    }

    #[test]
    fn test_write_round_trip() {
        round_trip(WriteRequest {
            nodes_to_write: vec![WriteValue::new(
                NodeId::string(1, "Q1"),
                AttributeId::Value,
                DataValue::of(Variant::Boolean(false)),
            )],
            ..Default::default()
        });

        round_trip(WriteResponse {
            results: vec![StatusCode::GOOD, StatusCode::BAD_TYPE_MISMATCH],
            ..Default::default()
        });
    }

    #[test]
    fn test_attribute_id_parsing() {
        assert_eq!(AttributeId::from_u32(13), Some(AttributeId::Value));
        assert_eq!(AttributeId::from_u32(4), Some(AttributeId::DisplayName));
        assert_eq!(AttributeId::from_u32(8), None);
        assert_eq!(AttributeId::from_u32(21), None);
        assert_eq!(AttributeId::Value.as_u32(), 13);
    }

    #[test]
    fn test_invalid_timestamps_enum_rejected() {
        let mut buf = Buffer::new();
        RequestHeader::default().encode(&mut buf).unwrap();
        0f64.encode(&mut buf).unwrap();
        7u32.encode(&mut buf).unwrap();
        (-1i32).encode(&mut buf).unwrap();
        assert!(matches!(
            ReadRequest::decode(&mut buf),
            Err(CodecError::InvalidEnumValue {
                name: "TimestampsToReturn",
                value: 7
            })
        ));
    }
}
