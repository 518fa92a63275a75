//! Server-side state machines and the tokio listener.
//!
//! [`AddressSpace`] maps node ids to [`Node`] implementations;
//! [`Server`] owns the sessions and dispatches decoded service
//! requests; [`ServerConnection`] is the per-peer sans-io transport.
//! [`TcpServer`] (behind the `transport` feature) accepts connections
//! and drives one `ServerConnection` per peer.

mod address_space;
mod connection;
mod engine;
mod session;

pub use address_space::{
    AddressSpace, Node, NodeClass, ObjectNode, VariableNode, ACCESS_LEVEL_CURRENT_READ,
    ACCESS_LEVEL_CURRENT_WRITE,
};
pub use connection::ServerConnection;
pub use engine::Server;
pub use session::ServerSession;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
mod listener;

#[cfg(feature = "transport")]
pub use listener::{ServerConfig, ServerError, TcpServer};
