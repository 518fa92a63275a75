//! Server-side session state.

use crate::core::constants::SERVER_NAMESPACE_INDEX;
use crate::services::CreateSessionRequest;
use crate::types::{Guid, NodeId};

/// One session as the server sees it.
///
/// Sessions are minted by CreateSession with random GUID identifiers
/// in the server namespace and survive secure-channel re-attachment;
/// only the channel binding changes.
#[derive(Debug, Clone)]
pub struct ServerSession {
    session_name: String,
    endpoint_uri: String,
    session_id: NodeId,
    authentication_token: NodeId,
    activated: bool,
    attached_channel: Option<u32>,
}

impl ServerSession {
    /// Mint a session for a CreateSessionRequest.
    pub fn create(request: &CreateSessionRequest) -> Self {
        Self {
            session_name: request.session_name.clone(),
            endpoint_uri: request.endpoint_uri.clone(),
            session_id: NodeId::guid(SERVER_NAMESPACE_INDEX, Guid::random()),
            authentication_token: NodeId::guid(SERVER_NAMESPACE_INDEX, Guid::random()),
            activated: false,
            attached_channel: None,
        }
    }

    /// The session's name as the client chose it.
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// The endpoint the client connected to.
    pub fn endpoint_uri(&self) -> &str {
        &self.endpoint_uri
    }

    /// The minted session id.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The minted authentication token.
    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    /// Whether ActivateSession has succeeded.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// The secure channel currently serving this session.
    pub fn attached_channel(&self) -> Option<u32> {
        self.attached_channel
    }

    /// Bind the session to the channel that activated it.
    pub(crate) fn attach(&mut self, channel_id: u32) {
        self.attached_channel = Some(channel_id);
        self.activated = true;
    }

    /// Unbind from a closing channel; the session itself survives.
    pub(crate) fn detach(&mut self) {
        self.attached_channel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_identifiers_are_distinct() {
        let request = CreateSessionRequest {
            session_name: "test".into(),
            ..Default::default()
        };
        let a = ServerSession::create(&request);
        let b = ServerSession::create(&request);

        assert_ne!(a.session_id(), a.authentication_token());
        assert_ne!(a.session_id(), b.session_id());
        assert_ne!(a.authentication_token(), b.authentication_token());
        assert_eq!(a.session_id().namespace(), SERVER_NAMESPACE_INDEX);
    }

    #[test]
    fn test_attach_detach_cycle() {
        let mut session = ServerSession::create(&CreateSessionRequest::default());
        assert!(!session.is_activated());

        session.attach(4);
        assert!(session.is_activated());
        assert_eq!(session.attached_channel(), Some(4));

        session.detach();
        assert!(session.is_activated());
        assert_eq!(session.attached_channel(), None);

        session.attach(9);
        assert_eq!(session.attached_channel(), Some(9));
    }
}
