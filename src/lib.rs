//! # OPC UA Stack
//!
//! A layered implementation of the OPC UA TCP binary protocol core:
//! the wire codec, secure-channel framing and chunking, and the channel
//! and session state machines a client or server builds on.
//!
//! The protocol core is *sans-io*: every state machine consumes bytes and
//! produces bytes through [`codec::Buffer`] values and never touches a
//! socket. The optional tokio drivers (behind the `transport` feature)
//! connect those state machines to real TCP streams.
//!
//! - **Codec**: symmetric binary (de)serialization for every protocol
//!   type - tagged unions ([`types::NodeId`], [`types::Variant`]),
//!   length-prefixed strings and arrays, optional-field bitmasks
//!   ([`types::DataValue`]) and polymorphic envelopes
//!   ([`services::ExtensionObject`]).
//! - **Framing**: the three-layer envelope (transport message /
//!   secure-channel message / service message) with sequence numbers,
//!   request-id correlation and chunk reassembly.
//! - **State machines**: connection handshake, secure-channel lifetime,
//!   session creation and activation, request/response correlation, and
//!   server-side address-space dispatch.
//!
//! Only security mode `None` is implemented; signing and encryption are
//! out of scope, with the security headers carried where they would
//! attach.
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio TCP drivers for the sans-io core
//! - `client` (default): client connection and session APIs
//! - `server` (default): address space, server engine and listener
//!
//! ## Modules
//!
//! - [`core`]: status codes, errors and protocol constants (always included)
//! - [`types`]: the protocol value model (always included)
//! - [`codec`]: buffers and binary (de)serialization (always included)
//! - [`services`]: service structures and the type-id registry (always included)
//! - [`transport`]: framing, security headers and secure channels (always included)
//! - [`client`]: client state machines (requires `client` feature)
//! - [`server`]: server state machines (requires `server` feature)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Value model (always included)
pub mod types;

// Binary codec (always included)
pub mod codec;

// Service structures (always included)
pub mod services;

// Framing and secure channels (always included)
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{BinaryDecode, BinaryEncode, Buffer, ReadBuffer, WriteBuffer};
    pub use crate::core::{CodecError, StatusCode, TransportError};
    pub use crate::services::{
        AttributeId, ReadRequest, ReadValueId, ServiceMessage, TimestampsToReturn, WriteRequest,
        WriteValue,
    };
    pub use crate::types::{DataValue, DateTime, Guid, NodeId, Variant};

    #[cfg(feature = "client")]
    pub use crate::client::{ClientConnection, Session};

    #[cfg(feature = "server")]
    pub use crate::server::{AddressSpace, Server, ServerConnection, VariableNode};
}

// Re-export commonly used items at crate root
pub use crate::codec::{BinaryDecode, BinaryEncode, Buffer};
pub use crate::core::{CodecError, StatusCode, TransportError};
pub use crate::services::ServiceMessage;
pub use crate::types::{DataValue, DateTime, Guid, NodeId, Variant};
