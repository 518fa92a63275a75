//! Attribute values with status and timestamps.

use super::date_time::DateTime;
use super::variant::Variant;
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};

// Presence-mask bits, one per optional field.
const VALUE_SPECIFIED: u8 = 0x01;
const STATUS_CODE_SPECIFIED: u8 = 0x02;
const SOURCE_TIMESTAMP_SPECIFIED: u8 = 0x04;
const SERVER_TIMESTAMP_SPECIFIED: u8 = 0x08;
const SOURCE_PICOSECONDS_SPECIFIED: u8 = 0x10;
const SERVER_PICOSECONDS_SPECIFIED: u8 = 0x20;

/// A value read from or written to a node attribute.
///
/// Every field is optional; a single mask byte leads the wire form and
/// fields appear only when their bit is set. Absent status means Good.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The attribute value.
    pub value: Option<Variant>,
    /// Status of the read or write that produced this value.
    pub status: Option<StatusCode>,
    /// When the source observed the value.
    pub source_timestamp: Option<DateTime>,
    /// Picosecond remainder of the source timestamp.
    pub source_picoseconds: Option<u16>,
    /// When the server observed the value.
    pub server_timestamp: Option<DateTime>,
    /// Picosecond remainder of the server timestamp.
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// A data value carrying only a value.
    pub fn of(value: impl Into<Variant>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A data value carrying only a status code.
    pub fn of_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// The effective status: an absent status code means Good.
    pub fn effective_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::GOOD)
    }

    fn mask(&self) -> u8 {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= VALUE_SPECIFIED;
        }
        if self.status.is_some() {
            mask |= STATUS_CODE_SPECIFIED;
        }
        if self.source_timestamp.is_some() {
            mask |= SOURCE_TIMESTAMP_SPECIFIED;
        }
        if self.source_picoseconds.is_some() {
            mask |= SOURCE_PICOSECONDS_SPECIFIED;
        }
        if self.server_timestamp.is_some() {
            mask |= SERVER_TIMESTAMP_SPECIFIED;
        }
        if self.server_picoseconds.is_some() {
            mask |= SERVER_PICOSECONDS_SPECIFIED;
        }
        mask
    }
}

impl BinaryEncode for DataValue {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.mask().encode(buf)?;
        if let Some(value) = &self.value {
            value.encode(buf)?;
        }
        if let Some(status) = self.status {
            status.0.encode(buf)?;
        }
        if let Some(ts) = self.source_timestamp {
            ts.encode(buf)?;
        }
        if let Some(picos) = self.source_picoseconds {
            picos.encode(buf)?;
        }
        if let Some(ts) = self.server_timestamp {
            ts.encode(buf)?;
        }
        if let Some(picos) = self.server_picoseconds {
            picos.encode(buf)?;
        }
        Ok(())
    }
}

impl BinaryDecode for DataValue {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let mask = buf.read_byte()?;
        let mut dv = Self::default();
        if mask & VALUE_SPECIFIED != 0 {
            dv.value = Some(Variant::decode(buf)?);
        }
        if mask & STATUS_CODE_SPECIFIED != 0 {
            dv.status = Some(StatusCode(u32::decode(buf)?));
        }
        if mask & SOURCE_TIMESTAMP_SPECIFIED != 0 {
            dv.source_timestamp = Some(DateTime::decode(buf)?);
        }
        if mask & SOURCE_PICOSECONDS_SPECIFIED != 0 {
            dv.source_picoseconds = Some(u16::decode(buf)?);
        }
        if mask & SERVER_TIMESTAMP_SPECIFIED != 0 {
            dv.server_timestamp = Some(DateTime::decode(buf)?);
        }
        if mask & SERVER_PICOSECONDS_SPECIFIED != 0 {
            dv.server_picoseconds = Some(u16::decode(buf)?);
        }
        Ok(dv)
    }
}
