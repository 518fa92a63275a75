//! Client session state.

use std::fmt;

use tracing::debug;

use crate::core::StatusCode;
use crate::services::{CreateSessionResponse, ServiceMessage};
use crate::types::{DateTime, NodeId};

/// Callback fired once for a request's outcome: the decoded response,
/// or the status of a transport-level failure (timeout, teardown).
pub type ResponseCallback = Box<dyn FnOnce(Result<ServiceMessage, StatusCode>) + Send>;

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for its channel to open.
    Inactive,
    /// CreateSessionRequest is in flight.
    Creating,
    /// ActivateSessionRequest is in flight.
    Activating,
    /// Ready for service requests.
    Active,
    /// CloseSessionRequest is in flight.
    Closing,
    /// Closed; no further requests are accepted.
    Closed,
}

struct PendingRequest {
    handle: u32,
    deadline: Option<DateTime>,
    callback: ResponseCallback,
}

/// One client session: identity tokens, the pending-request map and
/// the queue of requests issued before activation.
///
/// A session outlives its secure channel; on re-attachment it
/// re-activates with the authentication token it already holds.
pub struct Session {
    name: String,
    channel: usize,
    state: SessionState,
    session_id: NodeId,
    authentication_token: NodeId,
    /// Insertion-ordered so teardown fails callbacks in send order.
    pending: Vec<PendingRequest>,
    queued: Vec<(ServiceMessage, ResponseCallback)>,
    established: Option<ResponseCallback>,
}

impl Session {
    pub(crate) fn new(name: &str, channel: usize, established: ResponseCallback) -> Self {
        Self {
            name: name.to_string(),
            channel,
            state: SessionState::Inactive,
            session_id: NodeId::NULL,
            authentication_token: NodeId::NULL,
            pending: Vec::new(),
            queued: Vec::new(),
            established: Some(established),
        }
    }

    /// The session's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session's lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The server-assigned session id, null until created.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The server-assigned authentication token, null until created.
    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    /// Local key of the channel this session is attached to.
    pub(crate) fn channel(&self) -> usize {
        self.channel
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Re-attach to another channel (the session keeps its tokens).
    pub(crate) fn reattach(&mut self, channel: usize) {
        self.channel = channel;
        if self.state == SessionState::Active {
            self.state = SessionState::Inactive;
        }
    }

    /// Adopt the identity minted by a CreateSessionResponse.
    pub(crate) fn on_created(&mut self, resp: &CreateSessionResponse) {
        self.session_id = resp.session_id.clone();
        self.authentication_token = resp.authentication_token.clone();
        self.state = SessionState::Activating;
        debug!(session = %self.session_id, "session created");
    }

    /// Mark active and fire the established callback.
    pub(crate) fn on_activated(&mut self, resp: ServiceMessage) {
        self.state = SessionState::Active;
        debug!(session = %self.session_id, "session active");
        if let Some(cb) = self.established.take() {
            cb(Ok(resp));
        }
    }

    /// Bring-up failed; surface the status through the established
    /// callback.
    pub(crate) fn fail_establishment(&mut self, status: StatusCode) {
        self.state = SessionState::Closed;
        if let Some(cb) = self.established.take() {
            cb(Err(status));
        }
    }

    /// Stamp the session's authentication token into a request.
    pub(crate) fn stamp(&self, msg: &mut ServiceMessage) {
        if let Some(header) = msg.request_header_mut() {
            header.authentication_token = self.authentication_token.clone();
        }
    }

    /// Record a callback for an in-flight request.
    ///
    /// A nonzero `timeout_hint` sets the eviction deadline.
    pub(crate) fn track(&mut self, handle: u32, timeout_hint: u32, callback: ResponseCallback) {
        let deadline =
            (timeout_hint > 0).then(|| DateTime::now().add_millis(u64::from(timeout_hint)));
        self.pending.push(PendingRequest {
            handle,
            deadline,
            callback,
        });
    }

    /// Queue a request until the session becomes active.
    pub(crate) fn queue(&mut self, msg: ServiceMessage, callback: ResponseCallback) {
        self.queued.push((msg, callback));
    }

    /// Drain the requests queued while inactive.
    pub(crate) fn take_queued(&mut self) -> Vec<(ServiceMessage, ResponseCallback)> {
        std::mem::take(&mut self.queued)
    }

    /// Whether a request with this handle is pending.
    pub(crate) fn has_pending(&self, handle: u32) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    /// Fire and remove the callback recorded under `handle`.
    ///
    /// Returns false when no request with that handle is pending.
    pub(crate) fn complete(
        &mut self,
        handle: u32,
        result: Result<ServiceMessage, StatusCode>,
    ) -> bool {
        match self.pending.iter().position(|p| p.handle == handle) {
            Some(idx) => {
                let entry = self.pending.remove(idx);
                (entry.callback)(result);
                true
            }
            None => false,
        }
    }

    /// Evict every pending request whose deadline has passed, firing
    /// its callback with `BadTimeout`.
    pub(crate) fn expire(&mut self, now: DateTime) {
        let mut kept = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            match entry.deadline {
                Some(deadline) if deadline <= now => {
                    debug!(handle = entry.handle, "request timed out");
                    (entry.callback)(Err(StatusCode::BAD_TIMEOUT));
                }
                _ => kept.push(entry),
            }
        }
        self.pending = kept;
    }

    /// Fail every pending and queued request, in insertion order.
    pub(crate) fn fail_all(&mut self, status: StatusCode) {
        for entry in self.pending.drain(..) {
            (entry.callback)(Err(status));
        }
        for (_, callback) in self.queued.drain(..) {
            callback(Err(status));
        }
        if let Some(cb) = self.established.take() {
            cb(Err(status));
        }
    }

    /// Number of requests awaiting responses.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("pending", &self.pending.len())
            .field("queued", &self.queued.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn noop() -> ResponseCallback {
        Box::new(|_| {})
    }

    #[test]
    fn test_track_and_complete() {
        let mut s = Session::new("s", 0, noop());
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        s.track(
            7,
            0,
            Box::new(move |r| {
                assert!(r.is_ok());
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(s.has_pending(7));
        assert!(!s.complete(8, Err(StatusCode::BAD_TIMEOUT)));
        assert!(s.complete(
            7,
            Ok(ServiceMessage::CloseSessionResponse(Default::default()))
        ));
        assert!(!s.has_pending(7));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expiry_only_hits_deadlined_requests() {
        let mut s = Session::new("s", 0, noop());
        let timed_out = Arc::new(AtomicU32::new(0));

        let t = timed_out.clone();
        s.track(
            1,
            1_000,
            Box::new(move |r| {
                assert_eq!(r.unwrap_err(), StatusCode::BAD_TIMEOUT);
                t.fetch_add(1, Ordering::SeqCst);
            }),
        );
        s.track(2, 0, Box::new(|_| panic!("undeadlined request evicted")));

        s.expire(DateTime::now().add_millis(5_000));
        assert_eq!(timed_out.load(Ordering::SeqCst), 1);
        assert_eq!(s.pending_count(), 1);
        assert!(s.has_pending(2));
    }

    #[test]
    fn test_fail_all_preserves_insertion_order() {
        let mut s = Session::new("s", 0, noop());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for handle in [3u32, 1, 2] {
            let order = order.clone();
            s.track(
                handle,
                0,
                Box::new(move |r| {
                    assert_eq!(r.unwrap_err(), StatusCode::BAD_CONNECTION_CLOSED);
                    order.lock().unwrap().push(handle);
                }),
            );
        }
        s.fail_all(StatusCode::BAD_CONNECTION_CLOSED);
        assert_eq!(*order.lock().unwrap(), vec![3, 1, 2]);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn test_stamp_attaches_token() {
        let mut s = Session::new("s", 0, noop());
        s.session_id = NodeId::string(1, "sid");
        s.authentication_token = NodeId::string(1, "tok");

        let mut msg = ServiceMessage::ReadRequest(Default::default());
        s.stamp(&mut msg);
        assert_eq!(
            msg.request_header().unwrap().authentication_token,
            NodeId::string(1, "tok")
        );
    }
}
