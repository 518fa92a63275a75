//! The protocol value model.
//!
//! Every type here carries a symmetric binary codec via
//! [`crate::codec::BinaryEncode`] / [`crate::codec::BinaryDecode`].

mod data_value;
mod date_time;
mod guid;
mod node_id;
mod text;
mod variant;

pub use data_value::DataValue;
pub use date_time::DateTime;
pub use guid::Guid;
pub use node_id::NodeId;
pub use text::{LocalizedText, QualifiedName};
pub use variant::Variant;

/// An opaque sequence of bytes, sharing the string length discipline.
pub type ByteString = Vec<u8>;
