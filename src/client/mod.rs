//! Client-side state machines and the tokio connector.
//!
//! [`ClientConnection`] is the sans-io client: it performs the HEL/ACK
//! handshake, opens and renews secure channels, brings sessions up
//! (create, then activate with an anonymous identity), correlates
//! responses with per-request callbacks and queues requests issued
//! before a session is ready. [`Client`] (behind the `transport`
//! feature) drives a `ClientConnection` over a tokio TCP stream.

mod connection;
mod session;

pub use connection::{ClientConnection, ConnPhase};
pub use session::{ResponseCallback, Session, SessionState};

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
mod client;

#[cfg(feature = "transport")]
pub use client::{Client, ClientBuilder, ClientConfig, ClientError};
