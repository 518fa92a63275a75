//! The server engine: session ownership and service dispatch.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::address_space::AddressSpace;
use super::session::ServerSession;
use crate::codec::Buffer;
use crate::core::constants::{
    MAX_RESPONSE_MESSAGE_SIZE, NONCE_LENGTH, REQUESTED_TOKEN_LIFETIME_MS, SECURITY_POLICY_NONE,
};
use crate::core::{StatusCode, TransportError};
use crate::services::{
    ActivateSessionRequest, ActivateSessionResponse, AttributeId, BrowsePathResult,
    CloseSessionRequest, CloseSessionResponse, CreateSessionRequest, CreateSessionResponse,
    EndpointDescription, MessageSecurityMode, OpenSecureChannelRequest, OpenSecureChannelResponse,
    ReadRequest, ReadResponse, ResponseHeader, ServiceMessage, TimestampsToReturn,
    TranslateBrowsePathsToNodeIdsRequest, TranslateBrowsePathsToNodeIdsResponse, UserTokenPolicy,
    UserTokenType, WriteRequest, WriteResponse,
};
use crate::services::ChannelSecurityToken;
use crate::transport::{MessageType, SecureChannel, TransportLimits};
use crate::types::{DataValue, DateTime, NodeId};

fn random_nonce() -> Vec<u8> {
    (0..NONCE_LENGTH).map(|_| rand::random()).collect()
}

fn random_token_id() -> u32 {
    loop {
        let token: u32 = rand::random();
        if token != 0 {
            return token;
        }
    }
}

/// The server core: the address space, the session set and channel-id
/// allocation.
///
/// One `Server` is shared by every [`super::ServerConnection`]; the
/// connections own the secure channels, the server owns the sessions.
#[derive(Debug)]
pub struct Server {
    limits: TransportLimits,
    address_space: AddressSpace,
    sessions: HashMap<NodeId, ServerSession>,
    next_channel_id: u32,
}

impl Server {
    /// A server exposing the given address space.
    pub fn new(address_space: AddressSpace) -> Self {
        Self {
            limits: TransportLimits::default(),
            address_space,
            sessions: HashMap::new(),
            next_channel_id: 1,
        }
    }

    /// The limits advertised in ACK messages.
    pub fn limits(&self) -> &TransportLimits {
        &self.limits
    }

    /// The served address space.
    pub fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    /// Mutable access to the served address space.
    pub fn address_space_mut(&mut self) -> &mut AddressSpace {
        &mut self.address_space
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Allocate the next secure-channel id.
    pub(crate) fn allocate_channel_id(&mut self) -> u32 {
        let id = self.next_channel_id;
        self.next_channel_id += 1;
        id
    }

    /// A channel owned by a torn-down connection is gone; unbind its
    /// session.
    pub(crate) fn on_channel_closed(&mut self, session_token: Option<&NodeId>) {
        if let Some(token) = session_token {
            if let Some(session) = self.sessions.get_mut(token) {
                session.detach();
            }
        }
    }

    /// Handle a decoded OpenSecureChannel request on `channel`,
    /// answering through it.
    pub(crate) fn open_secure_channel(
        &mut self,
        channel: &mut SecureChannel,
        channel_id: u32,
        request_id: u32,
        request: OpenSecureChannelRequest,
        peer: &TransportLimits,
        out: &mut Buffer,
    ) -> Result<(), TransportError> {
        let handle = request.request_header.request_handle;

        if request.security_mode != MessageSecurityMode::None {
            warn!(mode = ?request.security_mode, "security mode rejected");
            let mut resp = ServiceMessage::OpenSecureChannelResponse(OpenSecureChannelResponse {
                response_header: ResponseHeader::answering(
                    handle,
                    StatusCode::BAD_SECURITY_MODE_REJECTED,
                ),
                ..Default::default()
            });
            return channel.send_response(&mut resp, request_id, MessageType::OpenChannel, peer, out);
        }

        let token_id = random_token_id();
        let revised_lifetime = if request.requested_lifetime == 0 {
            REQUESTED_TOKEN_LIFETIME_MS
        } else {
            request.requested_lifetime
        };
        channel.open_for_server(channel_id, token_id, revised_lifetime);
        info!(channel = channel_id, request_type = ?request.request_type, "secure channel open");

        let mut resp = ServiceMessage::OpenSecureChannelResponse(OpenSecureChannelResponse {
            response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
            server_protocol_version: 0,
            security_token: ChannelSecurityToken {
                channel_id,
                token_id,
                created_at: DateTime::now(),
                revised_lifetime,
            },
            server_nonce: random_nonce(),
        });
        channel.send_response(&mut resp, request_id, MessageType::OpenChannel, peer, out)
    }

    /// Dispatch one decoded MSG-level service request and answer it.
    ///
    /// Returns true when the request closed the channel.
    pub(crate) fn dispatch(
        &mut self,
        channel: &mut SecureChannel,
        request_id: u32,
        message: ServiceMessage,
        peer: &TransportLimits,
        out: &mut Buffer,
    ) -> Result<bool, TransportError> {
        debug!(service = message.name(), request = request_id, "dispatch");
        let mut response = match message {
            ServiceMessage::CreateSessionRequest(req) => {
                ServiceMessage::CreateSessionResponse(self.create_session(&req))
            }
            ServiceMessage::ActivateSessionRequest(req) => {
                ServiceMessage::ActivateSessionResponse(self.activate_session(&req, channel))
            }
            ServiceMessage::CloseSessionRequest(req) => {
                ServiceMessage::CloseSessionResponse(self.close_session(&req))
            }
            ServiceMessage::ReadRequest(req) => ServiceMessage::ReadResponse(self.read(&req)),
            ServiceMessage::WriteRequest(req) => ServiceMessage::WriteResponse(self.write(&req)),
            ServiceMessage::TranslateBrowsePathsToNodeIdsRequest(req) => {
                ServiceMessage::TranslateBrowsePathsToNodeIdsResponse(self.translate(&req))
            }
            ServiceMessage::CloseSecureChannelRequest(_) => {
                // No response is sent for a channel close.
                self.on_channel_closed(channel.attached_session());
                channel.close();
                return Ok(true);
            }
            other => {
                warn!(service = other.name(), "unexpected service message");
                return Err(TransportError::UnexpectedMessage("non-request service message"));
            }
        };
        channel.send_response(&mut response, request_id, MessageType::Message, peer, out)?;
        Ok(false)
    }

    fn create_session(&mut self, request: &CreateSessionRequest) -> CreateSessionResponse {
        let handle = request.request_header.request_handle;
        let session = ServerSession::create(request);
        let resp = CreateSessionResponse {
            response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
            session_id: session.session_id().clone(),
            authentication_token: session.authentication_token().clone(),
            revised_session_timeout: request.requested_session_timeout,
            server_nonce: random_nonce(),
            server_certificate: Vec::new(),
            server_endpoints: vec![EndpointDescription {
                endpoint_url: request.endpoint_uri.clone(),
                security_mode: MessageSecurityMode::None,
                security_policy_uri: SECURITY_POLICY_NONE.to_string(),
                user_identity_tokens: vec![UserTokenPolicy {
                    policy_id: crate::core::constants::ANONYMOUS_POLICY_ID.to_string(),
                    token_type: UserTokenType::Anonymous,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            max_request_message_size: MAX_RESPONSE_MESSAGE_SIZE,
            ..Default::default()
        };
        info!(session = %session.session_id(), name = session.session_name(), "session created");
        self.sessions
            .insert(session.authentication_token().clone(), session);
        resp
    }

    fn activate_session(
        &mut self,
        request: &ActivateSessionRequest,
        channel: &mut SecureChannel,
    ) -> ActivateSessionResponse {
        let token = &request.request_header.authentication_token;
        let handle = request.request_header.request_handle;
        match self.sessions.get_mut(token) {
            Some(session) => {
                session.attach(channel.channel_id());
                channel.attach_session(token.clone());
                info!(session = %session.session_id(), channel = channel.channel_id(), "session active");
                ActivateSessionResponse {
                    response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
                    server_nonce: random_nonce(),
                    results: vec![StatusCode::GOOD],
                    ..Default::default()
                }
            }
            None => {
                warn!("activation with unknown authentication token");
                ActivateSessionResponse {
                    response_header: ResponseHeader::answering(
                        handle,
                        StatusCode::BAD_SESSION_ID_INVALID,
                    ),
                    ..Default::default()
                }
            }
        }
    }

    fn close_session(&mut self, request: &CloseSessionRequest) -> CloseSessionResponse {
        let token = &request.request_header.authentication_token;
        let handle = request.request_header.request_handle;
        let status = match self.sessions.remove(token) {
            Some(session) => {
                info!(session = %session.session_id(), "session closed");
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SESSION_ID_INVALID,
        };
        CloseSessionResponse {
            response_header: ResponseHeader::answering(handle, status),
        }
    }

    /// The session a request's authentication token addresses, checked
    /// for activation.
    ///
    /// Takes the session map rather than `&self` so callers can keep
    /// the address space mutably borrowed alongside the session.
    fn authorized_session<'a>(
        sessions: &'a HashMap<NodeId, ServerSession>,
        token: &NodeId,
    ) -> Result<&'a ServerSession, StatusCode> {
        match sessions.get(token) {
            Some(session) if session.is_activated() => Ok(session),
            Some(_) => Err(StatusCode::BAD_SESSION_NOT_ACTIVATED),
            None => Err(StatusCode::BAD_SESSION_ID_INVALID),
        }
    }

    fn read(&mut self, request: &ReadRequest) -> ReadResponse {
        let handle = request.request_header.request_handle;
        let session = match Self::authorized_session(&self.sessions, &request.request_header.authentication_token) {
            Ok(session) => session,
            Err(status) => {
                return ReadResponse {
                    response_header: ResponseHeader::answering(handle, status),
                    ..Default::default()
                };
            }
        };
        if request.nodes_to_read.is_empty() {
            return ReadResponse {
                response_header: ResponseHeader::answering(handle, StatusCode::BAD_NOTHING_TO_DO),
                ..Default::default()
            };
        }

        let now = DateTime::now();
        let mut results = Vec::with_capacity(request.nodes_to_read.len());
        for item in &request.nodes_to_read {
            let value = match AttributeId::from_u32(item.attribute_id) {
                None => DataValue::of_status(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
                Some(attribute) => match self.address_space.get_mut(&item.node_id) {
                    None => DataValue::of_status(StatusCode::BAD_NODE_ID_UNKNOWN),
                    Some(node) => {
                        match node.read_attribute(attribute, session, request.max_age) {
                            Ok(variant) => {
                                let mut dv = DataValue::of(variant);
                                match request.timestamps_to_return {
                                    TimestampsToReturn::Source => {
                                        dv.source_timestamp = Some(now);
                                    }
                                    TimestampsToReturn::Server => {
                                        dv.server_timestamp = Some(now);
                                    }
                                    TimestampsToReturn::Both => {
                                        dv.source_timestamp = Some(now);
                                        dv.server_timestamp = Some(now);
                                    }
                                    TimestampsToReturn::Neither => {}
                                }
                                dv
                            }
                            Err(status) => DataValue::of_status(status),
                        }
                    }
                },
            };
            results.push(value);
        }

        ReadResponse {
            response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
            results,
            ..Default::default()
        }
    }

    fn write(&mut self, request: &WriteRequest) -> WriteResponse {
        let handle = request.request_header.request_handle;
        let session = match Self::authorized_session(&self.sessions, &request.request_header.authentication_token) {
            Ok(session) => session,
            Err(status) => {
                return WriteResponse {
                    response_header: ResponseHeader::answering(handle, status),
                    ..Default::default()
                };
            }
        };
        if request.nodes_to_write.is_empty() {
            return WriteResponse {
                response_header: ResponseHeader::answering(handle, StatusCode::BAD_NOTHING_TO_DO),
                ..Default::default()
            };
        }

        let mut results = Vec::with_capacity(request.nodes_to_write.len());
        for item in &request.nodes_to_write {
            let status = match AttributeId::from_u32(item.attribute_id) {
                None => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
                Some(attribute) => match self.address_space.get_mut(&item.node_id) {
                    None => StatusCode::BAD_NODE_ID_UNKNOWN,
                    Some(node) => match &item.value.value {
                        Some(variant) => node.write_attribute(attribute, session, variant),
                        None => StatusCode::BAD_TYPE_MISMATCH,
                    },
                },
            };
            results.push(status);
        }

        WriteResponse {
            response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
            results,
            ..Default::default()
        }
    }

    /// Browse paths are carried on the wire but the address space
    /// tracks no references; every path answers no-match.
    fn translate(
        &mut self,
        request: &TranslateBrowsePathsToNodeIdsRequest,
    ) -> TranslateBrowsePathsToNodeIdsResponse {
        let handle = request.request_header.request_handle;
        if let Err(status) =
            Self::authorized_session(&self.sessions, &request.request_header.authentication_token)
        {
            return TranslateBrowsePathsToNodeIdsResponse {
                response_header: ResponseHeader::answering(handle, status),
                ..Default::default()
            };
        }
        if request.browse_paths.is_empty() {
            return TranslateBrowsePathsToNodeIdsResponse {
                response_header: ResponseHeader::answering(handle, StatusCode::BAD_NOTHING_TO_DO),
                ..Default::default()
            };
        }
        TranslateBrowsePathsToNodeIdsResponse {
            response_header: ResponseHeader::answering(handle, StatusCode::GOOD),
            results: request
                .browse_paths
                .iter()
                .map(|_| BrowsePathResult {
                    status_code: StatusCode::BAD_NO_MATCH,
                    targets: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }
    }
}
