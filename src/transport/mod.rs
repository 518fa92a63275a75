//! Framing and secure channels.
//!
//! This module implements the two outer layers of the three-layer
//! envelope:
//!
//! - **Transport messages**: the 8-byte outer header
//!   ([`MessageHeader`]), the `HEL`/`ACK`/`ERR` handshake bodies, and
//!   the [`FrameReader`] that waits for complete messages on a byte
//!   stream
//! - **Secure-channel messages**: security headers, sequence headers,
//!   and the [`SecureChannel`] state machine that chunks outgoing
//!   service messages against the peer's advertised receive buffer and
//!   reassembles incoming intermediate/final/aborted chunks
//!
//! The service-message layer itself lives in [`crate::services`].
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Service messages              │
//! ├──────────────────────────────────────────┤
//! │          Secure-channel layer            │  ← chunk.rs, channel.rs
//! │   security header, sequence numbers,     │
//! │   chunking and reassembly                │
//! ├──────────────────────────────────────────┤
//! │           Transport framing              │  ← message.rs, framing.rs
//! │   HEL / ACK / ERR / OPN / MSG / CLO      │
//! ├──────────────────────────────────────────┤
//! │                  TCP                     │
//! └──────────────────────────────────────────┘
//! ```

mod channel;
mod chunk;
mod framing;
mod message;

pub use channel::{ChannelState, ChunkOutcome, SecureChannel};
pub use chunk::{AsymmetricSecurityHeader, SequenceHeader, SymmetricSecurityHeader};
pub use framing::{write_error, write_framed, FrameReader};
pub use message::{
    Acknowledge, ErrorMessage, Finality, Hello, MessageHeader, MessageType, TransportLimits,
};
