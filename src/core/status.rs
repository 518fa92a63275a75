//! Status codes carried in response headers and data values.

use std::fmt;

/// Opaque 32-bit status code.
///
/// The top two bits classify severity: `00` good, `01` uncertain,
/// `10` bad. The named constants below are the subset of codes this
/// stack produces or inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Operation succeeded.
    pub const GOOD: Self = Self(0);

    /// An unexpected internal error occurred.
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    /// A low-level communication error occurred.
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    /// Encoding halted because of an invalid value.
    pub const BAD_ENCODING_ERROR: Self = Self(0x8006_0000);
    /// Decoding halted because of malformed input.
    pub const BAD_DECODING_ERROR: Self = Self(0x8007_0000);
    /// The request timed out before a response arrived.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    /// The requested service is not implemented.
    pub const BAD_SERVICE_UNSUPPORTED: Self = Self(0x800B_0000);
    /// The request carried no operations to perform.
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);
    /// The supplied identity token was rejected.
    pub const BAD_IDENTITY_TOKEN_REJECTED: Self = Self(0x8021_0000);
    /// The secure channel id is not known to the server.
    pub const BAD_SECURE_CHANNEL_ID_INVALID: Self = Self(0x8022_0000);
    /// The session id (authentication token) does not match a session.
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    /// The session was closed by the client.
    pub const BAD_SESSION_CLOSED: Self = Self(0x8026_0000);
    /// The session has not been activated.
    pub const BAD_SESSION_NOT_ACTIVATED: Self = Self(0x8027_0000);
    /// The node id is not present in the address space.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// The attribute id is invalid for this node.
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    /// The node's attribute cannot be read.
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    /// The node's attribute cannot be written.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// The security mode is rejected (only `None` is supported).
    pub const BAD_SECURITY_MODE_REJECTED: Self = Self(0x8053_0000);
    /// No match was found for the browse path.
    pub const BAD_NO_MATCH: Self = Self(0x806F_0000);
    /// The written value's type does not match the attribute's type.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    /// The outer message type was not recognized.
    pub const BAD_TCP_MESSAGE_TYPE_INVALID: Self = Self(0x807E_0000);
    /// A chunk carried a security token the channel does not hold.
    pub const BAD_SECURE_CHANNEL_TOKEN_UNKNOWN: Self = Self(0x8086_0000);
    /// The connection to the peer was closed.
    pub const BAD_CONNECTION_CLOSED: Self = Self(0x80AE_0000);

    /// Whether the severity bits classify this code as good.
    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Whether the severity bits classify this code as bad.
    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl From<u32> for StatusCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> u32 {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_predicates() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(!StatusCode::BAD_TIMEOUT.is_good());
        assert!(StatusCode::BAD_NODE_ID_UNKNOWN.is_bad());
    }

    #[test]
    fn test_raw_round_trip() {
        let code = StatusCode::from(0x8034_0000);
        assert_eq!(code, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(u32::from(code), 0x8034_0000);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BAD_TIMEOUT.to_string(), "0x800A0000");
    }
}
