//! CreateSession, ActivateSession and CloseSession services.

use super::extension::ExtensionObject;
use super::header::{DiagnosticInfo, RequestHeader, ResponseHeader};
use super::secure_channel::MessageSecurityMode;
use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};
use crate::types::{ByteString, LocalizedText, NodeId};

/// The role an application plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ApplicationType {
    /// A server.
    #[default]
    Server = 0,
    /// A client.
    Client = 1,
    /// Both client and server.
    ClientAndServer = 2,
    /// A discovery server.
    DiscoveryServer = 3,
}

impl ApplicationType {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Server),
            1 => Some(Self::Client),
            2 => Some(Self::ClientAndServer),
            3 => Some(Self::DiscoveryServer),
            _ => None,
        }
    }
}

/// Identity of an application endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationDescription {
    /// Globally unique application URI.
    pub application_uri: String,
    /// Product URI.
    pub product_uri: String,
    /// Human-readable application name.
    pub application_name: LocalizedText,
    /// The application's role.
    pub application_type: ApplicationType,
    /// Gateway the application sits behind, if any.
    pub gateway_server_uri: String,
    /// Discovery profile supported, if any.
    pub discovery_profile_uri: String,
    /// URLs discovery requests may use.
    pub discovery_urls: Vec<String>,
}

impl ApplicationDescription {
    /// A description carrying only the application type.
    pub fn of_type(application_type: ApplicationType) -> Self {
        Self {
            application_type,
            ..Self::default()
        }
    }
}

impl BinaryEncode for ApplicationDescription {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.application_uri.encode(buf)?;
        self.product_uri.encode(buf)?;
        self.application_name.encode(buf)?;
        (self.application_type as u32).encode(buf)?;
        self.gateway_server_uri.encode(buf)?;
        self.discovery_profile_uri.encode(buf)?;
        self.discovery_urls.encode(buf)
    }
}

impl BinaryDecode for ApplicationDescription {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let application_uri = String::decode(buf)?;
        let product_uri = String::decode(buf)?;
        let application_name = LocalizedText::decode(buf)?;
        let raw_type = u32::decode(buf)?;
        let application_type =
            ApplicationType::from_u32(raw_type).ok_or(CodecError::InvalidEnumValue {
                name: "ApplicationType",
                value: raw_type,
            })?;
        Ok(Self {
            application_uri,
            product_uri,
            application_name,
            application_type,
            gateway_server_uri: String::decode(buf)?,
            discovery_profile_uri: String::decode(buf)?,
            discovery_urls: Vec::decode(buf)?,
        })
    }
}

/// The kind of identity a token policy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum UserTokenType {
    /// No credentials.
    #[default]
    Anonymous = 0,
    /// User name and password.
    UserName = 1,
    /// X.509 certificate.
    Certificate = 2,
    /// Token issued by an external authority.
    IssuedToken = 3,
}

impl UserTokenType {
    /// Parse from the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Anonymous),
            1 => Some(Self::UserName),
            2 => Some(Self::Certificate),
            3 => Some(Self::IssuedToken),
            _ => None,
        }
    }
}

/// An identity-token policy offered by an endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserTokenPolicy {
    /// Policy identifier echoed in identity tokens.
    pub policy_id: String,
    /// Kind of identity accepted.
    pub token_type: UserTokenType,
    /// Issued-token type URI, if applicable.
    pub issued_token_type: String,
    /// Issuer endpoint, if applicable.
    pub issuer_endpoint_url: String,
    /// Security policy applied to the token.
    pub security_policy_uri: String,
}

impl BinaryEncode for UserTokenPolicy {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.policy_id.encode(buf)?;
        (self.token_type as u32).encode(buf)?;
        self.issued_token_type.encode(buf)?;
        self.issuer_endpoint_url.encode(buf)?;
        self.security_policy_uri.encode(buf)
    }
}

impl BinaryDecode for UserTokenPolicy {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let policy_id = String::decode(buf)?;
        let raw_type = u32::decode(buf)?;
        let token_type = UserTokenType::from_u32(raw_type).ok_or(CodecError::InvalidEnumValue {
            name: "UserTokenType",
            value: raw_type,
        })?;
        Ok(Self {
            policy_id,
            token_type,
            issued_token_type: String::decode(buf)?,
            issuer_endpoint_url: String::decode(buf)?,
            security_policy_uri: String::decode(buf)?,
        })
    }
}

/// An endpoint a server exposes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointDescription {
    /// The endpoint's URL.
    pub endpoint_url: String,
    /// The serving application.
    pub server: ApplicationDescription,
    /// Server certificate, empty in mode `None`.
    pub server_certificate: ByteString,
    /// Security mode applied on this endpoint.
    pub security_mode: MessageSecurityMode,
    /// Security policy URI.
    pub security_policy_uri: String,
    /// Identity-token policies accepted.
    pub user_identity_tokens: Vec<UserTokenPolicy>,
    /// Transport profile URI.
    pub transport_profile_uri: String,
    /// Relative security level of this endpoint.
    pub security_level: u8,
}

impl BinaryEncode for EndpointDescription {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.endpoint_url.encode(buf)?;
        self.server.encode(buf)?;
        self.server_certificate.encode(buf)?;
        (self.security_mode as u32).encode(buf)?;
        self.security_policy_uri.encode(buf)?;
        self.user_identity_tokens.encode(buf)?;
        self.transport_profile_uri.encode(buf)?;
        self.security_level.encode(buf)
    }
}

impl BinaryDecode for EndpointDescription {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let endpoint_url = String::decode(buf)?;
        let server = ApplicationDescription::decode(buf)?;
        let server_certificate = ByteString::decode(buf)?;
        let raw_mode = u32::decode(buf)?;
        let security_mode =
            MessageSecurityMode::from_u32(raw_mode).ok_or(CodecError::InvalidEnumValue {
                name: "MessageSecurityMode",
                value: raw_mode,
            })?;
        Ok(Self {
            endpoint_url,
            server,
            server_certificate,
            security_mode,
            security_policy_uri: String::decode(buf)?,
            user_identity_tokens: Vec::decode(buf)?,
            transport_profile_uri: String::decode(buf)?,
            security_level: u8::decode(buf)?,
        })
    }
}

/// A software certificate with its signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignedSoftwareCertificate {
    /// The certificate bytes.
    pub certificate_data: ByteString,
    /// Signature over the certificate.
    pub signature: ByteString,
}

impl BinaryEncode for SignedSoftwareCertificate {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.certificate_data.encode(buf)?;
        self.signature.encode(buf)
    }
}

impl BinaryDecode for SignedSoftwareCertificate {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            certificate_data: ByteString::decode(buf)?,
            signature: ByteString::decode(buf)?,
        })
    }
}

/// A signature with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureData {
    /// Signature algorithm URI, empty when unsigned.
    pub algorithm: String,
    /// The signature bytes.
    pub signature: ByteString,
}

impl BinaryEncode for SignatureData {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.algorithm.encode(buf)?;
        self.signature.encode(buf)
    }
}

impl BinaryDecode for SignatureData {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            algorithm: String::decode(buf)?,
            signature: ByteString::decode(buf)?,
        })
    }
}

/// Request to create a session on the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSessionRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// The requesting client.
    pub client_description: ApplicationDescription,
    /// URI of the server the client believes it is talking to.
    pub server_uri: String,
    /// The endpoint URL the client connected to.
    pub endpoint_uri: String,
    /// Human-readable session name.
    pub session_name: String,
    /// Client nonce.
    pub client_nonce: ByteString,
    /// Client certificate, empty in mode `None`.
    pub client_certificate: ByteString,
    /// Requested session timeout, in milliseconds.
    pub requested_session_timeout: f64,
    /// Largest response the client accepts, in bytes.
    pub max_response_message_size: u32,
}

impl CreateSessionRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 459;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 461;
}

impl BinaryEncode for CreateSessionRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.client_description.encode(buf)?;
        self.server_uri.encode(buf)?;
        self.endpoint_uri.encode(buf)?;
        self.session_name.encode(buf)?;
        self.client_nonce.encode(buf)?;
        self.client_certificate.encode(buf)?;
        self.requested_session_timeout.encode(buf)?;
        self.max_response_message_size.encode(buf)
    }
}

impl BinaryDecode for CreateSessionRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
            client_description: ApplicationDescription::decode(buf)?,
            server_uri: String::decode(buf)?,
            endpoint_uri: String::decode(buf)?,
            session_name: String::decode(buf)?,
            client_nonce: ByteString::decode(buf)?,
            client_certificate: ByteString::decode(buf)?,
            requested_session_timeout: f64::decode(buf)?,
            max_response_message_size: u32::decode(buf)?,
        })
    }
}

/// Response carrying the minted session identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSessionResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// Server-minted session id.
    pub session_id: NodeId,
    /// Server-minted authentication token the client must attach to
    /// every subsequent request.
    pub authentication_token: NodeId,
    /// Session timeout granted, in milliseconds.
    pub revised_session_timeout: f64,
    /// Server nonce.
    pub server_nonce: ByteString,
    /// Server certificate, empty in mode `None`.
    pub server_certificate: ByteString,
    /// Endpoints the server exposes.
    pub server_endpoints: Vec<EndpointDescription>,
    /// Software certificates, unused here.
    pub server_software_certificates: Vec<SignedSoftwareCertificate>,
    /// Server signature, empty when unsigned.
    pub server_signature: SignatureData,
    /// Largest request the server accepts, in bytes.
    pub max_request_message_size: u32,
}

impl CreateSessionResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 462;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 464;
}

impl BinaryEncode for CreateSessionResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.session_id.encode(buf)?;
        self.authentication_token.encode(buf)?;
        self.revised_session_timeout.encode(buf)?;
        self.server_nonce.encode(buf)?;
        self.server_certificate.encode(buf)?;
        self.server_endpoints.encode(buf)?;
        self.server_software_certificates.encode(buf)?;
        self.server_signature.encode(buf)?;
        self.max_request_message_size.encode(buf)
    }
}

impl BinaryDecode for CreateSessionResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            session_id: NodeId::decode(buf)?,
            authentication_token: NodeId::decode(buf)?,
            revised_session_timeout: f64::decode(buf)?,
            server_nonce: ByteString::decode(buf)?,
            server_certificate: ByteString::decode(buf)?,
            server_endpoints: Vec::decode(buf)?,
            server_software_certificates: Vec::decode(buf)?,
            server_signature: SignatureData::decode(buf)?,
            max_request_message_size: u32::decode(buf)?,
        })
    }
}

/// Request to activate a created session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivateSessionRequest {
    /// Common request fields; the authentication token addresses the
    /// session being activated.
    pub request_header: RequestHeader,
    /// Client signature, empty when unsigned.
    pub client_signature: SignatureData,
    /// Client software certificates, unused here.
    pub client_software_certificates: Vec<SignedSoftwareCertificate>,
    /// Locales the client prefers, in order.
    pub locale_ids: Vec<String>,
    /// The identity asserted for this session.
    pub user_identity_token: ExtensionObject,
    /// Signature over the identity token, empty when unsigned.
    pub user_token_signature: SignatureData,
}

impl ActivateSessionRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 465;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 467;

    /// An anonymous activation with the given locale preference.
    pub fn anonymous(locale: &str) -> Self {
        Self {
            locale_ids: vec![locale.to_string()],
            user_identity_token: ExtensionObject::anonymous(),
            ..Self::default()
        }
    }
}

impl BinaryEncode for ActivateSessionRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.client_signature.encode(buf)?;
        self.client_software_certificates.encode(buf)?;
        self.locale_ids.encode(buf)?;
        self.user_identity_token.encode(buf)?;
        self.user_token_signature.encode(buf)
    }
}

impl BinaryDecode for ActivateSessionRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
            client_signature: SignatureData::decode(buf)?,
            client_software_certificates: Vec::decode(buf)?,
            locale_ids: Vec::decode(buf)?,
            user_identity_token: ExtensionObject::decode(buf)?,
            user_token_signature: SignatureData::decode(buf)?,
        })
    }
}

/// Response to a session activation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivateSessionResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
    /// Fresh server nonce.
    pub server_nonce: ByteString,
    /// One status per identity token attempted.
    pub results: Vec<StatusCode>,
    /// Diagnostics per identity token.
    pub diagnostic_infos: Vec<DiagnosticInfo>,
}

impl ActivateSessionResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 468;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 470;
}

impl BinaryEncode for ActivateSessionResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)?;
        self.server_nonce.encode(buf)?;
        self.results.encode(buf)?;
        self.diagnostic_infos.encode(buf)
    }
}

impl BinaryDecode for ActivateSessionResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
            server_nonce: ByteString::decode(buf)?,
            results: Vec::decode(buf)?,
            diagnostic_infos: Vec::decode(buf)?,
        })
    }
}

/// Request to close a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSessionRequest {
    /// Common request fields.
    pub request_header: RequestHeader,
    /// Whether server-side subscriptions die with the session.
    pub delete_subscriptions: bool,
}

impl CloseSessionRequest {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 471;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 473;
}

impl BinaryEncode for CloseSessionRequest {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.request_header.encode(buf)?;
        self.delete_subscriptions.encode(buf)
    }
}

impl BinaryDecode for CloseSessionRequest {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            request_header: RequestHeader::decode(buf)?,
            delete_subscriptions: bool::decode(buf)?,
        })
    }
}

/// Response acknowledging a session close.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseSessionResponse {
    /// Common response fields.
    pub response_header: ResponseHeader,
}

impl CloseSessionResponse {
    /// Abstract type id in the structure registry.
    pub const TYPE_ID: u32 = 474;
    /// Binary wire-encoding id.
    pub const ENCODING_ID: u32 = 476;
}

impl BinaryEncode for CloseSessionResponse {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.response_header.encode(buf)
    }
}

impl BinaryDecode for CloseSessionResponse {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            response_header: ResponseHeader::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    fn round_trip<T: BinaryEncode + BinaryDecode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Buffer::new();
        value.encode(&mut buf).unwrap();
        assert_eq!(T::decode(&mut buf).unwrap(), value);
        assert!(buf.is_empty(), "decoder left trailing bytes");
    }

    #[test]
    fn test_create_session_round_trip() {
        round_trip(CreateSessionRequest {
            client_description: ApplicationDescription::of_type(ApplicationType::Client),
            endpoint_uri: "opc.tcp://127.0.0.1:6001/sampleuaserver".into(),
            session_name: "test session".into(),
            client_nonce: vec![1, 2, 3, 4],
            requested_session_timeout: 1e9,
            max_response_message_size: 0x0100_0000,
            ..Default::default()
        });

        round_trip(CreateSessionResponse {
            session_id: NodeId::guid(1, crate::types::Guid::from_bytes(*b"ABCDEFGHIJKLMNOP")),
            authentication_token: NodeId::guid(
                1,
                crate::types::Guid::from_bytes(*b"PONMLKJIHGFEDCBA"),
            ),
            revised_session_timeout: 3600.0,
            server_nonce: vec![9; 32],
            ..Default::default()
        });
    }

    #[test]
    fn test_activate_session_round_trip() {
        round_trip(ActivateSessionRequest::anonymous("en"));
        round_trip(ActivateSessionResponse {
            results: vec![StatusCode::GOOD],
            ..Default::default()
        });
    }

    #[test]
    fn test_close_session_round_trip() {
        round_trip(CloseSessionRequest {
            delete_subscriptions: true,
            ..Default::default()
        });
        round_trip(CloseSessionResponse::default());
    }

    #[test]
    fn test_endpoint_description_round_trip() {
        round_trip(EndpointDescription {
            endpoint_url: "opc.tcp://h:6001/x".into(),
            security_policy_uri: crate::core::constants::SECURITY_POLICY_NONE.into(),
            user_identity_tokens: vec![UserTokenPolicy {
                policy_id: "anonPolicy".into(),
                token_type: UserTokenType::Anonymous,
                ..Default::default()
            }],
            ..Default::default()
        });
    }
}
