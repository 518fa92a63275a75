//! Core definitions shared by every layer.
//!
//! - [`constants`]: protocol constants fixed by the OPC UA TCP mapping
//! - [`StatusCode`] and the named `BAD_*` codes carried in responses
//! - [`CodecError`] / [`TransportError`]: the two error families of the
//!   sans-io core

pub mod constants;
mod error;
mod status;

pub use error::{CodecError, TransportError};
pub use status::StatusCode;
