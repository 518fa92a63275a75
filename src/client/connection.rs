//! The sans-io client connection.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::session::{ResponseCallback, Session, SessionState};
use crate::codec::{BinaryDecode, BinaryEncode, Buffer};
use crate::core::constants::{
    MAX_RESPONSE_MESSAGE_SIZE, NONCE_LENGTH, REQUESTED_SESSION_TIMEOUT_MS,
    REQUESTED_TOKEN_LIFETIME_MS,
};
use crate::core::{CodecError, StatusCode, TransportError};
use crate::services::{
    ActivateSessionRequest, ApplicationDescription, ApplicationType, CloseSecureChannelRequest,
    CloseSessionRequest, CreateSessionRequest, MessageSecurityMode, OpenSecureChannelRequest,
    SecurityTokenRequestType, ServiceMessage,
};
use crate::transport::{
    write_framed, Acknowledge, AsymmetricSecurityHeader, ChannelState, ChunkOutcome, ErrorMessage,
    Finality, FrameReader, Hello, MessageType, SecureChannel, SequenceHeader, TransportLimits,
};
use crate::types::DateTime;

/// Lifecycle of the transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnPhase {
    /// Socket not yet connected, or HEL not yet acknowledged.
    Connecting,
    /// ACK received; channels may open.
    Connected,
    /// Closed cleanly.
    Closed,
    /// Torn down after a fatal error.
    Failed,
}

fn random_nonce() -> Vec<u8> {
    (0..NONCE_LENGTH).map(|_| rand::random()).collect()
}

/// The client side of one transport connection.
///
/// Owns the secure channels opened over the connection and the
/// sessions riding on them. Sans-io: bytes arrive through
/// [`receive`](Self::receive), produced bytes leave through
/// [`take_output`](Self::take_output), and time is supplied to
/// [`poll`](Self::poll) by the embedder.
pub struct ClientConnection {
    endpoint_url: String,
    phase: ConnPhase,
    reader: FrameReader,
    out: Buffer,
    local_limits: TransportLimits,
    peer_limits: TransportLimits,
    /// Channels by local key; the key is stable for the connection's
    /// lifetime.
    channels: Vec<SecureChannel>,
    /// Server-assigned channel id to local key.
    channel_index: HashMap<u32, usize>,
    sessions: Vec<Session>,
}

impl ClientConnection {
    /// A connection that will request `endpoint_url` in its HEL.
    pub fn new(endpoint_url: &str) -> Self {
        Self {
            endpoint_url: endpoint_url.to_string(),
            phase: ConnPhase::Connecting,
            reader: FrameReader::new(),
            out: Buffer::new(),
            local_limits: TransportLimits::default(),
            peer_limits: TransportLimits::default(),
            channels: Vec::new(),
            channel_index: HashMap::new(),
            sessions: Vec::new(),
        }
    }

    /// The connection phase.
    pub fn phase(&self) -> ConnPhase {
        self.phase
    }

    /// The limits the peer advertised in its ACK.
    pub fn peer_limits(&self) -> &TransportLimits {
        &self.peer_limits
    }

    /// State of the channel with the given local key.
    pub fn channel_state(&self, channel: usize) -> Option<ChannelState> {
        self.channels.get(channel).map(SecureChannel::state)
    }

    /// State of the session with the given local key.
    pub fn session_state(&self, session: usize) -> Option<SessionState> {
        self.sessions.get(session).map(Session::state)
    }

    /// The session with the given local key.
    pub fn session(&self, session: usize) -> Option<&Session> {
        self.sessions.get(session)
    }

    /// Drain the bytes produced since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.out.take_all()
    }

    /// The socket is connected: say hello.
    pub fn on_connected(&mut self) -> Result<(), TransportError> {
        let mut body = Buffer::new();
        let hello = Hello {
            limits: self.local_limits,
            endpoint_url: self.endpoint_url.clone(),
        };
        hello.encode(&mut body)?;
        write_framed(&mut self.out, MessageType::Hello, Finality::Final, None, &mut body)?;
        debug!(endpoint = %self.endpoint_url, "sent HEL");
        Ok(())
    }

    /// Queue a new secure channel; OPN is sent once the transport is
    /// acknowledged. Returns the channel's local key.
    pub fn open_channel(&mut self) -> Result<usize, TransportError> {
        self.channels.push(SecureChannel::new());
        let key = self.channels.len() - 1;
        if self.phase == ConnPhase::Connected {
            self.send_open(key, SecurityTokenRequestType::Issue)?;
        }
        Ok(key)
    }

    /// Create a session riding on `channel`. The session is created
    /// and activated automatically once the channel opens;
    /// `established` fires with the ActivateSessionResponse (or the
    /// failure status). Returns the session's local key.
    pub fn create_session(
        &mut self,
        channel: usize,
        name: &str,
        established: ResponseCallback,
    ) -> usize {
        self.sessions.push(Session::new(name, channel, established));
        let key = self.sessions.len() - 1;
        if self.channels.get(channel).map(SecureChannel::state) == Some(ChannelState::Open) {
            self.begin_create(key);
        }
        key
    }

    /// Re-attach a session to another channel: the session re-activates
    /// with the authentication token it already holds, or is created
    /// anew if it never was.
    pub fn attach_session(&mut self, session: usize, channel: usize) {
        let Some(s) = self.sessions.get_mut(session) else {
            return;
        };
        s.reattach(channel);
        if self.channels.get(channel).map(SecureChannel::state) == Some(ChannelState::Open) {
            if self
                .sessions
                .get(session)
                .map(|s| s.authentication_token().is_null())
                .unwrap_or(true)
            {
                self.begin_create(session);
            } else {
                self.begin_activate(session);
            }
        }
    }

    /// Send a service request on a session.
    ///
    /// The request is stamped with the session's authentication token
    /// and correlated by its request handle; `callback` fires exactly
    /// once. Requests issued before the session is active are queued.
    pub fn send(&mut self, session: usize, msg: ServiceMessage, callback: ResponseCallback) {
        let Some(state) = self.sessions.get(session).map(Session::state) else {
            callback(Err(StatusCode::BAD_SESSION_ID_INVALID));
            return;
        };
        match state {
            SessionState::Active => {
                if let Err(status) = self.send_on_session(session, msg, callback) {
                    warn!(%status, "failed to send request");
                }
            }
            SessionState::Inactive | SessionState::Creating | SessionState::Activating => {
                self.sessions[session].queue(msg, callback);
            }
            SessionState::Closing | SessionState::Closed => {
                callback(Err(StatusCode::BAD_SESSION_CLOSED));
            }
        }
    }

    /// Close a session with CloseSessionRequest.
    pub fn close_session(&mut self, session: usize, callback: ResponseCallback) {
        let msg = ServiceMessage::CloseSessionRequest(CloseSessionRequest {
            delete_subscriptions: true,
            ..Default::default()
        });
        if let Some(s) = self.sessions.get_mut(session) {
            s.set_state(SessionState::Closing);
        }
        self.send_on_session_or_fail(session, msg, callback);
    }

    /// Close a secure channel with CloseSecureChannelRequest.
    pub fn close_channel(&mut self, channel: usize) -> Result<(), TransportError> {
        let Some(ch) = self.channels.get_mut(channel) else {
            return Ok(());
        };
        if ch.state() == ChannelState::Open {
            let msg =
                ServiceMessage::CloseSecureChannelRequest(CloseSecureChannelRequest::default());
            ch.send_request(msg, MessageType::CloseChannel, &self.peer_limits, &mut self.out)?;
        }
        ch.close();
        Ok(())
    }

    /// Feed received stream bytes and process every complete message.
    ///
    /// An error is fatal to the connection; the caller should emit an
    /// ERR frame where possible, then call
    /// [`fail_all`](Self::fail_all) and drop the socket.
    pub fn receive(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.reader.push(data);
        while let Some((header, mut body)) = self.reader.next_frame()? {
            match header.message_type {
                MessageType::Acknowledge => {
                    let ack = Acknowledge::decode(&mut body)?;
                    self.peer_limits = ack.limits;
                    self.phase = ConnPhase::Connected;
                    debug!(
                        receive_buffer = ack.limits.receive_buffer_size,
                        "transport acknowledged"
                    );
                    // Push every channel still waiting for its OPN.
                    for key in 0..self.channels.len() {
                        if self.channels[key].state() == ChannelState::Opening
                            && self.channels[key].open_request_id().is_none()
                        {
                            self.send_open(key, SecurityTokenRequestType::Issue)?;
                        }
                    }
                }
                MessageType::Error => {
                    let err = ErrorMessage::decode(&mut body)?;
                    return Err(TransportError::PeerError {
                        code: StatusCode(err.error),
                        reason: err.reason,
                    });
                }
                MessageType::OpenChannel => self.handle_open_response(body)?,
                MessageType::Message | MessageType::CloseChannel => {
                    let channel_id = u32::decode(&mut body)?;
                    let key = *self
                        .channel_index
                        .get(&channel_id)
                        .ok_or(TransportError::UnknownChannel(channel_id))?;
                    match self.channels[key].handle_chunk(&header, body)? {
                        ChunkOutcome::Incomplete => {}
                        ChunkOutcome::Aborted {
                            request_id, error, ..
                        } => self.fail_request(key, request_id, error),
                        ChunkOutcome::Message { message, .. } => {
                            self.route_response(key, message)?;
                        }
                    }
                }
                MessageType::Hello => {
                    return Err(TransportError::UnexpectedMessage("HEL"));
                }
            }
        }
        Ok(())
    }

    /// Advance time-based state: request timeouts and token renewals.
    pub fn poll(&mut self, now: DateTime) {
        for session in &mut self.sessions {
            session.expire(now);
        }
        for key in 0..self.channels.len() {
            if self.channels[key].needs_renewal(now) {
                if let Err(err) = self.send_open(key, SecurityTokenRequestType::Renew) {
                    warn!(%err, "token renewal failed");
                }
            }
        }
    }

    /// Tear down: fail every outstanding request on every session, in
    /// insertion order, and close every channel.
    pub fn fail_all(&mut self, status: StatusCode) {
        self.phase = ConnPhase::Failed;
        for session in &mut self.sessions {
            session.fail_all(status);
        }
        for channel in &mut self.channels {
            channel.close();
        }
    }

    /// Cleanly close: cancel outstanding requests with
    /// `BadConnectionClosed` and mark the connection closed.
    pub fn close(&mut self) {
        self.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
        self.phase = ConnPhase::Closed;
    }

    fn send_open(
        &mut self,
        key: usize,
        request_type: SecurityTokenRequestType,
    ) -> Result<(), TransportError> {
        let msg = ServiceMessage::OpenSecureChannelRequest(OpenSecureChannelRequest::new(
            request_type,
            MessageSecurityMode::None,
            Vec::new(),
            REQUESTED_TOKEN_LIFETIME_MS,
        ));
        let request_id = self.channels[key].send_request(
            msg,
            MessageType::OpenChannel,
            &self.peer_limits,
            &mut self.out,
        )?;
        self.channels[key].mark_opening(request_id);
        debug!(channel = key, ?request_type, "sent OPN");
        Ok(())
    }

    /// Process an OPN response: match it against the channel that sent
    /// the request, adopt the token, then bring up its sessions.
    fn handle_open_response(&mut self, mut body: Buffer) -> Result<(), TransportError> {
        let channel_id = u32::decode(&mut body)?;
        let _security = AsymmetricSecurityHeader::decode(&mut body)?;
        let sequence = SequenceHeader::decode(&mut body)?;
        let message = ServiceMessage::decode(&mut body)?;
        if !body.is_empty() {
            return Err(CodecError::TrailingBytes(body.len()).into());
        }
        let ServiceMessage::OpenSecureChannelResponse(resp) = message else {
            return Err(TransportError::UnexpectedMessage("OPN"));
        };

        let key = self
            .channels
            .iter()
            .position(|c| c.open_request_id() == Some(sequence.request_id))
            .ok_or(TransportError::UnmatchedOpenResponse(sequence.request_id))?;

        let service_result = resp.response_header.service_result;
        if service_result.is_bad() {
            warn!(%service_result, "secure channel rejected");
            self.channels[key].close();
            for session in &mut self.sessions {
                if session.channel() == key {
                    session.fail_establishment(service_result);
                }
            }
            return Ok(());
        }

        self.channels[key].complete_open(channel_id, &resp.security_token);
        self.channel_index.insert(channel_id, key);

        for idx in 0..self.sessions.len() {
            if self.sessions[idx].channel() == key
                && self.sessions[idx].state() == SessionState::Inactive
            {
                self.begin_create(idx);
            }
        }
        Ok(())
    }

    fn begin_create(&mut self, session: usize) {
        let s = &self.sessions[session];
        let msg = ServiceMessage::CreateSessionRequest(CreateSessionRequest {
            client_description: ApplicationDescription::of_type(ApplicationType::Client),
            endpoint_uri: self.endpoint_url.clone(),
            session_name: s.name().to_string(),
            client_nonce: random_nonce(),
            requested_session_timeout: REQUESTED_SESSION_TIMEOUT_MS,
            max_response_message_size: MAX_RESPONSE_MESSAGE_SIZE,
            ..Default::default()
        });
        let channel = s.channel();
        match self.channels[channel].send_request(
            msg,
            MessageType::Message,
            &self.peer_limits,
            &mut self.out,
        ) {
            Ok(_) => self.sessions[session].set_state(SessionState::Creating),
            Err(err) => {
                warn!(%err, "CreateSessionRequest failed to send");
                self.sessions[session].fail_establishment(err.status());
            }
        }
    }

    fn begin_activate(&mut self, session: usize) {
        let mut msg = ServiceMessage::ActivateSessionRequest(ActivateSessionRequest::anonymous("en"));
        self.sessions[session].stamp(&mut msg);
        let channel = self.sessions[session].channel();
        match self.channels[channel].send_request(
            msg,
            MessageType::Message,
            &self.peer_limits,
            &mut self.out,
        ) {
            Ok(_) => self.sessions[session].set_state(SessionState::Activating),
            Err(err) => {
                warn!(%err, "ActivateSessionRequest failed to send");
                self.sessions[session].fail_establishment(err.status());
            }
        }
    }

    fn send_on_session(
        &mut self,
        session: usize,
        mut msg: ServiceMessage,
        callback: ResponseCallback,
    ) -> Result<(), StatusCode> {
        let timeout_hint = msg
            .request_header()
            .map(|h| h.timeout_hint)
            .unwrap_or_default();
        self.sessions[session].stamp(&mut msg);
        let channel = self.sessions[session].channel();
        match self.channels[channel].send_request(
            msg,
            MessageType::Message,
            &self.peer_limits,
            &mut self.out,
        ) {
            Ok(handle) => {
                self.sessions[session].track(handle, timeout_hint, callback);
                Ok(())
            }
            Err(err) => {
                let status = err.status();
                callback(Err(status));
                Err(status)
            }
        }
    }

    fn send_on_session_or_fail(
        &mut self,
        session: usize,
        msg: ServiceMessage,
        callback: ResponseCallback,
    ) {
        if self.sessions.get(session).is_none() {
            callback(Err(StatusCode::BAD_SESSION_ID_INVALID));
            return;
        }
        let _ = self.send_on_session(session, msg, callback);
    }

    fn fail_request(&mut self, channel_key: usize, request_id: u32, status: StatusCode) {
        for session in &mut self.sessions {
            if session.channel() == channel_key && session.complete(request_id, Err(status)) {
                return;
            }
        }
        warn!(request = request_id, "abort for unknown request");
    }

    /// Deliver a decoded response to the owning session.
    fn route_response(
        &mut self,
        channel_key: usize,
        message: ServiceMessage,
    ) -> Result<(), TransportError> {
        let Some(response_header) = message.response_header() else {
            return Err(TransportError::UnexpectedMessage("request on client side"));
        };
        let handle = response_header.request_handle;
        let service_result = response_header.service_result;

        match message {
            ServiceMessage::CreateSessionResponse(resp) => {
                let Some(idx) = self.session_in_state(channel_key, SessionState::Creating) else {
                    return Err(TransportError::UnexpectedMessage("CreateSessionResponse"));
                };
                if service_result.is_bad() {
                    self.sessions[idx].fail_establishment(service_result);
                } else {
                    self.sessions[idx].on_created(&resp);
                    self.begin_activate(idx);
                }
            }
            ServiceMessage::ActivateSessionResponse(resp) => {
                let Some(idx) = self.session_in_state(channel_key, SessionState::Activating)
                else {
                    return Err(TransportError::UnexpectedMessage("ActivateSessionResponse"));
                };
                let token_result = resp.results.first().copied().unwrap_or(StatusCode::GOOD);
                if service_result.is_bad() {
                    self.sessions[idx].fail_establishment(service_result);
                } else if token_result.is_bad() {
                    self.sessions[idx].fail_establishment(token_result);
                } else {
                    self.sessions[idx]
                        .on_activated(ServiceMessage::ActivateSessionResponse(resp));
                    self.flush_queued(idx);
                }
            }
            other => {
                let is_close = matches!(&other, ServiceMessage::CloseSessionResponse(_));
                let Some(idx) = self
                    .sessions
                    .iter()
                    .position(|s| s.channel() == channel_key && s.has_pending(handle))
                else {
                    return Err(TransportError::UnexpectedMessage(
                        "response with unknown request handle",
                    ));
                };
                self.sessions[idx].complete(handle, Ok(other));
                if is_close && self.sessions[idx].state() == SessionState::Closing {
                    self.sessions[idx].set_state(SessionState::Closed);
                }
            }
        }
        Ok(())
    }

    fn session_in_state(&self, channel_key: usize, state: SessionState) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.channel() == channel_key && s.state() == state)
    }

    fn flush_queued(&mut self, session: usize) {
        for (msg, callback) in self.sessions[session].take_queued() {
            if self.send_on_session(session, msg, callback).is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("endpoint_url", &self.endpoint_url)
            .field("phase", &self.phase)
            .field("channels", &self.channels.len())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
