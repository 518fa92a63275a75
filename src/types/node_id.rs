//! Node identifiers.

use std::fmt;

use super::guid::Guid;
use super::ByteString;
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::CodecError;

// Wire encoding tags.
const TWO_BYTE: u8 = 0;
const FOUR_BYTE: u8 = 1;
const NUMERIC: u8 = 2;
const STRING: u8 = 3;
const GUID: u8 = 4;
const BYTE_STRING: u8 = 5;

/// The protocol's uniform identifier for any object in an address space.
///
/// A tagged union over numeric, string, GUID and byte-string forms, each
/// scoped by a namespace index. Numeric ids use the most compact of
/// three wire forms:
///
/// - `TWO_BYTE` when the namespace is 0 and the id fits a byte
/// - `FOUR_BYTE` when the namespace fits a byte and the id 16 bits
/// - `NUMERIC` otherwise
///
/// `NodeId` doubles as a hash-map key (address space, session sets) and
/// as a wire value, so equality is by form and payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// Numeric id in a namespace.
    Numeric {
        /// Namespace index.
        ns: u16,
        /// Identifier value.
        id: u32,
    },
    /// UTF-8 string id in a namespace.
    String {
        /// Namespace index.
        ns: u16,
        /// Identifier value.
        id: String,
    },
    /// GUID id in a namespace.
    Guid {
        /// Namespace index.
        ns: u16,
        /// Identifier value.
        id: Guid,
    },
    /// Opaque byte-string id in a namespace.
    ByteString {
        /// Namespace index.
        ns: u16,
        /// Identifier value.
        id: ByteString,
    },
}

impl NodeId {
    /// The null node id (numeric 0 in namespace 0).
    pub const NULL: Self = Self::Numeric { ns: 0, id: 0 };

    /// A numeric id in namespace 0.
    pub const fn numeric(id: u32) -> Self {
        Self::Numeric { ns: 0, id }
    }

    /// A numeric id in the given namespace.
    pub const fn numeric_in(ns: u16, id: u32) -> Self {
        Self::Numeric { ns, id }
    }

    /// A string id in the given namespace.
    pub fn string(ns: u16, id: impl Into<String>) -> Self {
        Self::String { ns, id: id.into() }
    }

    /// A GUID id in the given namespace.
    pub const fn guid(ns: u16, id: Guid) -> Self {
        Self::Guid { ns, id }
    }

    /// A byte-string id in the given namespace.
    pub const fn byte_string(ns: u16, id: ByteString) -> Self {
        Self::ByteString { ns, id }
    }

    /// Whether this is the null id.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The namespace index, whatever the form.
    pub fn namespace(&self) -> u16 {
        match self {
            Self::Numeric { ns, .. }
            | Self::String { ns, .. }
            | Self::Guid { ns, .. }
            | Self::ByteString { ns, .. } => *ns,
        }
    }

    /// The numeric id value, if this is the numeric form.
    pub fn as_numeric(&self) -> Option<(u16, u32)> {
        match self {
            Self::Numeric { ns, id } => Some((*ns, *id)),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric { ns, id } => write!(f, "ns={ns};i={id}"),
            Self::String { ns, id } => write!(f, "ns={ns};s={id}"),
            Self::Guid { ns, id } => write!(f, "ns={ns};g={id}"),
            Self::ByteString { ns, id } => write!(f, "ns={ns};b={}b", id.len()),
        }
    }
}

impl BinaryEncode for NodeId {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        match self {
            Self::Numeric { ns, id } => {
                if *ns == 0 && *id <= 0xFF {
                    TWO_BYTE.encode(buf)?;
                    (*id as u8).encode(buf)
                } else if *ns <= 0xFF && *id <= 0xFFFF {
                    FOUR_BYTE.encode(buf)?;
                    (*ns as u8).encode(buf)?;
                    (*id as u16).encode(buf)
                } else {
                    NUMERIC.encode(buf)?;
                    ns.encode(buf)?;
                    id.encode(buf)
                }
            }
            Self::String { ns, id } => {
                STRING.encode(buf)?;
                ns.encode(buf)?;
                id.encode(buf)
            }
            Self::Guid { ns, id } => {
                GUID.encode(buf)?;
                ns.encode(buf)?;
                id.encode(buf)
            }
            Self::ByteString { ns, id } => {
                BYTE_STRING.encode(buf)?;
                ns.encode(buf)?;
                id.encode(buf)
            }
        }
    }
}

impl BinaryDecode for NodeId {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let tag = buf.read_byte()?;
        match tag {
            TWO_BYTE => {
                let id = buf.read_byte()?;
                Ok(Self::Numeric {
                    ns: 0,
                    id: u32::from(id),
                })
            }
            FOUR_BYTE => {
                let ns = buf.read_byte()?;
                let id = u16::decode(buf)?;
                Ok(Self::Numeric {
                    ns: u16::from(ns),
                    id: u32::from(id),
                })
            }
            NUMERIC => {
                let ns = u16::decode(buf)?;
                let id = u32::decode(buf)?;
                Ok(Self::Numeric { ns, id })
            }
            STRING => {
                let ns = u16::decode(buf)?;
                let id = String::decode(buf)?;
                Ok(Self::String { ns, id })
            }
            GUID => {
                let ns = u16::decode(buf)?;
                let id = Guid::decode(buf)?;
                Ok(Self::Guid { ns, id })
            }
            BYTE_STRING => {
                let ns = u16::decode(buf)?;
                let id = ByteString::decode(buf)?;
                Ok(Self::ByteString { ns, id })
            }
            other => Err(CodecError::InvalidNodeIdType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    fn encode_to_vec(id: &NodeId) -> Vec<u8> {
        let mut buf = Buffer::new();
        id.encode(&mut buf).unwrap();
        buf.take_all()
    }

    fn round_trip(id: NodeId) {
        let mut buf = Buffer::from(encode_to_vec(&id));
        assert_eq!(NodeId::decode(&mut buf).unwrap(), id);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_two_byte_form() {
        assert_eq!(encode_to_vec(&NodeId::numeric(0x72)), [0x00, 0x72]);
    }

    #[test]
    fn test_four_byte_form() {
        assert_eq!(
            encode_to_vec(&NodeId::numeric_in(5, 1025)),
            [0x01, 0x05, 0x01, 0x04]
        );
    }

    #[test]
    fn test_full_numeric_form() {
        assert_eq!(
            encode_to_vec(&NodeId::numeric_in(0x1100, 0x33BB_CCDD)),
            [0x02, 0x00, 0x11, 0xDD, 0xCC, 0xBB, 0x33]
        );
    }

    #[test]
    fn test_nonzero_namespace_never_two_byte() {
        // id fits a byte but the namespace does not allow TWO_BYTE.
        assert_eq!(encode_to_vec(&NodeId::numeric_in(2, 25)), [0x01, 0x02, 25, 0]);
    }

    #[test]
    fn test_string_form() {
        assert_eq!(
            encode_to_vec(&NodeId::string(1, "Hot水")),
            [0x03, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x48, 0x6F, 0x74, 0xE6, 0xB0, 0xB4]
        );
    }

    #[test]
    fn test_round_trips() {
        round_trip(NodeId::numeric(25));
        round_trip(NodeId::numeric_in(2, 0xAA00));
        round_trip(NodeId::numeric_in(0x1100, 0x33BB_CCDD));
        round_trip(NodeId::string(2, "foobarbaz"));
        round_trip(NodeId::guid(2, Guid::from_bytes(*b"ABCDEFGHIJKLMNOP")));
        round_trip(NodeId::byte_string(3, vec![1, 2, 3]));
    }

    #[test]
    fn test_invalid_tag() {
        let mut buf = Buffer::from(&[0x07u8, 0, 0][..]);
        assert_eq!(
            NodeId::decode(&mut buf),
            Err(CodecError::InvalidNodeIdType(0x07))
        );
    }

    #[test]
    fn test_null_and_namespace() {
        assert!(NodeId::NULL.is_null());
        assert!(!NodeId::numeric(1).is_null());
        assert_eq!(NodeId::string(7, "x").namespace(), 7);
        assert_eq!(NodeId::numeric(446).as_numeric(), Some((0, 446)));
    }
}
