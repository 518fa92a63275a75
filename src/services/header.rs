//! Request and response headers carried by every service message.

use super::extension::ExtensionObject;
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};
use crate::types::{DateTime, NodeId};

/// Header leading every service request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    /// The session's authentication token, null before activation.
    pub authentication_token: NodeId,
    /// When the request was produced.
    pub timestamp: DateTime,
    /// Client-chosen handle correlating the response.
    pub request_handle: u32,
    /// Diagnostic verbosity requested from the server.
    pub return_diagnostics: u32,
    /// Audit log entry supplied by the client.
    pub audit_entry_id: String,
    /// How long the client will wait for a response, in milliseconds.
    /// Zero means no hint.
    pub timeout_hint: u32,
    /// Reserved extension point, always empty.
    pub additional_header: ExtensionObject,
}

impl BinaryEncode for RequestHeader {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.authentication_token.encode(buf)?;
        self.timestamp.encode(buf)?;
        self.request_handle.encode(buf)?;
        self.return_diagnostics.encode(buf)?;
        self.audit_entry_id.encode(buf)?;
        self.timeout_hint.encode(buf)?;
        self.additional_header.encode(buf)
    }
}

impl BinaryDecode for RequestHeader {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            authentication_token: NodeId::decode(buf)?,
            timestamp: DateTime::decode(buf)?,
            request_handle: u32::decode(buf)?,
            return_diagnostics: u32::decode(buf)?,
            audit_entry_id: String::decode(buf)?,
            timeout_hint: u32::decode(buf)?,
            additional_header: ExtensionObject::decode(buf)?,
        })
    }
}

/// Diagnostic information attached to responses.
///
/// Only the flags byte is carried; no optional diagnostic field is
/// produced or consumed by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticInfo {
    /// Presence mask for the optional fields, always zero here.
    pub flags: u8,
}

impl BinaryEncode for DiagnosticInfo {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.flags.encode(buf)
    }
}

impl BinaryDecode for DiagnosticInfo {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            flags: u8::decode(buf)?,
        })
    }
}

/// Header leading every service response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// When the response was produced.
    pub timestamp: DateTime,
    /// Echo of the request's handle.
    pub request_handle: u32,
    /// Overall outcome of the service call.
    pub service_result: StatusCode,
    /// Diagnostics for the service result.
    pub service_diagnostics: DiagnosticInfo,
    /// String table referenced by diagnostics, unused here.
    pub string_table: Vec<String>,
    /// Reserved extension point, always empty.
    pub additional_header: ExtensionObject,
}

impl ResponseHeader {
    /// A header answering `request_handle` with the given result,
    /// stamped with the current time.
    pub fn answering(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            ..Self::default()
        }
    }
}

impl BinaryEncode for ResponseHeader {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.timestamp.encode(buf)?;
        self.request_handle.encode(buf)?;
        self.service_result.encode(buf)?;
        self.service_diagnostics.encode(buf)?;
        self.string_table.encode(buf)?;
        self.additional_header.encode(buf)
    }
}

impl BinaryDecode for ResponseHeader {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            timestamp: DateTime::decode(buf)?,
            request_handle: u32::decode(buf)?,
            service_result: StatusCode::decode(buf)?,
            service_diagnostics: DiagnosticInfo::decode(buf)?,
            string_table: Vec::decode(buf)?,
            additional_header: ExtensionObject::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    #[test]
    fn test_request_header_round_trip() {
        let header = RequestHeader {
            authentication_token: NodeId::string(1, "token"),
            timestamp: DateTime::from_unix_parts(1_700_000_000, 0),
            request_handle: 7,
            return_diagnostics: 0,
            audit_entry_id: String::new(),
            timeout_hint: 5_000,
            additional_header: ExtensionObject::default(),
        };
        let mut buf = Buffer::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(RequestHeader::decode(&mut buf).unwrap(), header);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_response_header_round_trip() {
        let header = ResponseHeader::answering(9, StatusCode::BAD_SESSION_ID_INVALID);
        let mut buf = Buffer::new();
        header.encode(&mut buf).unwrap();
        let decoded = ResponseHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded.request_handle, 9);
        assert_eq!(decoded.service_result, StatusCode::BAD_SESSION_ID_INVALID);
        assert!(buf.is_empty());
    }
}
