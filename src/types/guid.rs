//! 16-byte globally unique identifiers.

use std::fmt;

use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::CodecError;

/// A GUID in its canonical big-endian byte order.
///
/// The wire form encodes the first eight bytes as little-endian
/// `u32`, `u16`, `u16` fields and the last eight bytes verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid([u8; 16]);

impl Guid {
    /// The all-zero GUID.
    pub const NULL: Self = Self([0u8; 16]);

    /// Construct from canonical bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The canonical bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Mint a random (version 4) GUID.
    #[cfg(any(feature = "client", feature = "server"))]
    pub fn random() -> Self {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-\
             {:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

impl BinaryEncode for Guid {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        let b = &self.0;
        let data1 = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let data2 = u16::from_be_bytes([b[4], b[5]]);
        let data3 = u16::from_be_bytes([b[6], b[7]]);
        data1.encode(buf)?;
        data2.encode(buf)?;
        data3.encode(buf)?;
        buf.write(&b[8..]);
        Ok(())
    }
}

impl BinaryDecode for Guid {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let data1 = u32::decode(buf)?;
        let data2 = u16::decode(buf)?;
        let data3 = u16::decode(buf)?;

        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&data1.to_be_bytes());
        bytes[4..6].copy_from_slice(&data2.to_be_bytes());
        bytes[6..8].copy_from_slice(&data3.to_be_bytes());
        buf.read_exact(&mut bytes[8..])?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_wire_form() {
        // 72962B91-FA75-4AE6-8D28-B404DC7DAF63
        let guid = Guid::from_bytes([
            0x72, 0x96, 0x2B, 0x91, 0xFA, 0x75, 0x4A, 0xE6, 0x8D, 0x28, 0xB4, 0x04, 0xDC, 0x7D,
            0xAF, 0x63,
        ]);

        let mut buf = Buffer::new();
        guid.encode(&mut buf).unwrap();
        assert_eq!(hex::encode(buf.take_all()), "912b967275fae64a8d28b404dc7daf63");
    }

    #[test]
    fn test_round_trip() {
        let guid = Guid::from_bytes(*b"ABCDEFGHIJKLMNOP");
        let mut buf = Buffer::new();
        guid.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(Guid::decode(&mut buf).unwrap(), guid);
    }

    #[test]
    fn test_display() {
        let guid = Guid::from_bytes([
            0x72, 0x96, 0x2B, 0x91, 0xFA, 0x75, 0x4A, 0xE6, 0x8D, 0x28, 0xB4, 0x04, 0xDC, 0x7D,
            0xAF, 0x63,
        ]);
        assert_eq!(guid.to_string(), "72962B91-FA75-4AE6-8D28-B404DC7DAF63");
    }

    #[cfg(any(feature = "client", feature = "server"))]
    #[test]
    fn test_random_guids_differ() {
        assert_ne!(Guid::random(), Guid::random());
    }
}
