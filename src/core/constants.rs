//! Protocol constants fixed by the OPC UA TCP mapping.
//!
//! These values are part of the wire protocol and MUST NOT be changed.

// =============================================================================
// TRANSPORT
// =============================================================================

/// OPC UA TCP protocol version advertised in HEL/ACK.
pub const PROTOCOL_VERSION: u32 = 0;

/// Default server port.
pub const DEFAULT_PORT: u16 = 6001;

/// Outer message header size (3-byte type + finality byte + u32 size).
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Secure-conversation header size (outer header + u32 secure channel id).
pub const SECURE_MESSAGE_HEADER_SIZE: usize = 12;

/// Sequence header size (u32 sequence number + u32 request id).
pub const SEQUENCE_HEADER_SIZE: usize = 8;

/// Maximum accepted endpoint URL length in a HEL message.
pub const MAX_ENDPOINT_URL_LENGTH: usize = 4096;

/// Receive buffer size advertised to the peer.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 0x0010_0000;

/// Send buffer size advertised to the peer.
pub const DEFAULT_SEND_BUFFER_SIZE: u32 = 0x0010_0000;

// =============================================================================
// SECURE CHANNEL
// =============================================================================

/// Security policy URI for mode `None` (the only supported mode).
pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Channel token lifetime requested by clients, in milliseconds.
pub const REQUESTED_TOKEN_LIFETIME_MS: u32 = 360_000;

/// Percentage of the revised token lifetime after which a client
/// reissues OpenSecureChannel with request type RENEW.
pub const TOKEN_RENEWAL_PERCENT: u64 = 75;

/// Length of client/server nonces, in bytes.
pub const NONCE_LENGTH: usize = 32;

// =============================================================================
// SESSION
// =============================================================================

/// Namespace index for server-minted session and authentication node ids.
pub const SERVER_NAMESPACE_INDEX: u16 = 1;

/// Policy id of the anonymous identity token.
pub const ANONYMOUS_POLICY_ID: &str = "anonPolicy";

/// Session timeout requested by clients, in milliseconds.
pub const REQUESTED_SESSION_TIMEOUT_MS: f64 = 1e9;

/// Maximum response size accepted by clients, in bytes.
pub const MAX_RESPONSE_MESSAGE_SIZE: u32 = 0x0100_0000;

// =============================================================================
// TIME
// =============================================================================

/// Seconds between 1601-01-01 (the DateTime epoch) and the Unix epoch.
pub const UNIX_EPOCH_OFFSET_SECS: i64 = 11_644_478_640;

/// DateTime ticks (100 ns) per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;
