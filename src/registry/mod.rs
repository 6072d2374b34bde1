//! Transport connection registry
//!
//! Tracks every connected client and its outbound message channel, and
//! implements the session-scoped fan-out primitives the relay is built
//! on. The registry holds no poll or caption state of its own: it only
//! knows who is connected, to which session, and in which role.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::relay::{Role, ServerMessage, ViewerHandshake};

/// Opaque connection identifier, assigned at transport connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound channel handle for one connection
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// Session membership established by the `join` handshake
#[derive(Debug, Clone)]
pub struct Membership {
    pub session: String,
    pub role: Role,
    pub username: Option<String>,
}

struct ConnectionEntry {
    tx: MessageSender,
    membership: Option<Membership>,
    handshake: ViewerHandshake,
    connected_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Per-session summary for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session: String,
    pub streamers: usize,
    pub viewers: usize,
    pub viewer_states: Vec<ViewerHandshake>,
}

/// Hub-wide connection summary
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub connections: usize,
    pub joined: usize,
    pub sessions: Vec<SessionStatus>,
}

/// Registry of live connections
///
/// Eventually consistent: a connection whose channel has closed is
/// removed lazily on the next send that fails, or eagerly when the
/// transport reports the disconnect.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly connected transport channel.
    ///
    /// The connection has no session or role until it joins.
    pub fn register(&self, tx: MessageSender) -> ConnectionId {
        let id = ConnectionId::new();
        let now = Utc::now();
        self.inner.write().insert(
            id,
            ConnectionEntry {
                tx,
                membership: None,
                handshake: ViewerHandshake::default(),
                connected_at: now,
                last_seen: now,
            },
        );
        id
    }

    /// Remove a connection (transport disconnect or explicit close).
    pub fn unregister(&self, id: ConnectionId) -> Option<Membership> {
        self.inner
            .write()
            .remove(&id)
            .and_then(|entry| entry.membership)
    }

    /// Bind a connection to a session with an explicit role.
    pub fn join(
        &self,
        id: ConnectionId,
        session: String,
        role: Role,
        username: Option<String>,
    ) -> bool {
        let mut inner = self.inner.write();
        match inner.get_mut(&id) {
            Some(entry) => {
                entry.membership = Some(Membership {
                    session,
                    role,
                    username,
                });
                entry.handshake = ViewerHandshake::default();
                entry.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Refresh the last-seen timestamp on inbound traffic.
    pub fn touch(&self, id: ConnectionId) {
        if let Some(entry) = self.inner.write().get_mut(&id) {
            entry.last_seen = Utc::now();
        }
    }

    /// Session and role of a connection, if it has joined.
    pub fn membership(&self, id: ConnectionId) -> Option<Membership> {
        self.inner
            .read()
            .get(&id)
            .and_then(|entry| entry.membership.clone())
    }

    /// Deliver `msg` to every joined member of `session` except `sender`.
    ///
    /// Returns the number of connections the message was handed to. No
    /// acknowledgement is awaited; entries whose channel has closed are
    /// dropped from the registry on the way.
    pub fn broadcast_except(
        &self,
        session: &str,
        sender: ConnectionId,
        msg: ServerMessage,
    ) -> usize {
        self.fan_out(session, Some(sender), msg)
    }

    /// Deliver `msg` to every joined member of `session`, sender included.
    pub fn broadcast_all(&self, session: &str, msg: ServerMessage) -> usize {
        self.fan_out(session, None, msg)
    }

    fn fan_out(&self, session: &str, skip: Option<ConnectionId>, msg: ServerMessage) -> usize {
        let mut inner = self.inner.write();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, entry) in inner.iter() {
            if Some(*id) == skip {
                continue;
            }
            let Some(membership) = &entry.membership else {
                continue;
            };
            if membership.session != session {
                continue;
            }
            if entry.tx.send(msg.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            tracing::debug!(connection = %id, "Dropping stale connection on failed send");
            inner.remove(&id);
        }

        delivered
    }

    /// Send to a single connection (handshake replies, error notices).
    pub fn send_to(&self, id: ConnectionId, msg: ServerMessage) -> bool {
        let mut inner = self.inner.write();
        match inner.get(&id) {
            Some(entry) => {
                if entry.tx.send(msg).is_ok() {
                    true
                } else {
                    inner.remove(&id);
                    false
                }
            }
            None => false,
        }
    }

    /// Viewer announced readiness.
    pub fn note_viewer_ready(&self, id: ConnectionId) {
        if let Some(entry) = self.inner.write().get_mut(&id) {
            entry.handshake.ready_sent();
        }
    }

    /// An offer was broadcast into `session`: every ready viewer there
    /// has now received it.
    pub fn note_offer_broadcast(&self, session: &str, streamer: ConnectionId) {
        let mut inner = self.inner.write();
        for (id, entry) in inner.iter_mut() {
            if *id == streamer {
                continue;
            }
            let Some(membership) = &entry.membership else {
                continue;
            };
            if membership.session == session && membership.role == Role::Viewer {
                entry.handshake.offer_received();
            }
        }
    }

    /// Viewer emitted its answer.
    pub fn note_answer_sent(&self, id: ConnectionId) {
        if let Some(entry) = self.inner.write().get_mut(&id) {
            entry.handshake.answer_sent();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Aggregate status for the operator endpoint.
    pub fn status(&self) -> HubStatus {
        let inner = self.inner.read();
        let mut sessions: HashMap<String, SessionStatus> = HashMap::new();
        let mut joined = 0;

        for entry in inner.values() {
            let Some(membership) = &entry.membership else {
                continue;
            };
            joined += 1;
            let status = sessions
                .entry(membership.session.clone())
                .or_insert_with(|| SessionStatus {
                    session: membership.session.clone(),
                    streamers: 0,
                    viewers: 0,
                    viewer_states: Vec::new(),
                });
            match membership.role {
                Role::Streamer => status.streamers += 1,
                Role::Viewer => {
                    status.viewers += 1;
                    status.viewer_states.push(entry.handshake);
                }
            }
        }

        let mut sessions: Vec<SessionStatus> = sessions.into_values().collect();
        sessions.sort_by(|a, b| a.session.cmp(&b.session));

        HubStatus {
            connections: inner.len(),
            joined,
            sessions,
        }
    }

    /// Seconds since the connection last sent anything.
    pub fn idle_secs(&self, id: ConnectionId) -> Option<i64> {
        self.inner
            .read()
            .get(&id)
            .map(|entry| (Utc::now() - entry.last_seen).num_seconds())
    }

    /// Seconds since the connection was established.
    pub fn connected_secs(&self, id: ConnectionId) -> Option<i64> {
        self.inner
            .read()
            .get(&id)
            .map(|entry| (Utc::now() - entry.connected_at).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn connect(registry: &ConnectionRegistry) -> (ConnectionId, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = unbounded_channel();
        (registry.register(tx), rx)
    }

    fn join(
        registry: &ConnectionRegistry,
        session: &str,
        role: Role,
    ) -> (ConnectionId, UnboundedReceiver<ServerMessage>) {
        let (id, rx) = connect(registry);
        assert!(registry.join(id, session.to_string(), role, None));
        (id, rx)
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let registry = ConnectionRegistry::new();
        let (streamer, mut streamer_rx) = join(&registry, "ev-1", Role::Streamer);
        let (_viewer_a, mut viewer_a_rx) = join(&registry, "ev-1", Role::Viewer);
        let (_viewer_b, mut viewer_b_rx) = join(&registry, "ev-1", Role::Viewer);

        let offer = ServerMessage::StreamOffer(json!({"type": "offer", "sdp": "v=0"}));
        let delivered = registry.broadcast_except("ev-1", streamer, offer);

        assert_eq!(delivered, 2);
        assert!(matches!(
            viewer_a_rx.try_recv().unwrap(),
            ServerMessage::StreamOffer(_)
        ));
        assert!(matches!(
            viewer_b_rx.try_recv().unwrap(),
            ServerMessage::StreamOffer(_)
        ));
        // Exactly once each, and never back to the sender
        assert!(viewer_a_rx.try_recv().is_err());
        assert!(viewer_b_rx.try_recv().is_err());
        assert!(streamer_rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_scoped_to_session() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (_viewer, mut viewer_rx) = join(&registry, "ev-1", Role::Viewer);
        let (_other, mut other_rx) = join(&registry, "ev-2", Role::Viewer);

        let delivered = registry.broadcast_except("ev-1", streamer, ServerMessage::StartQa);

        assert_eq!(delivered, 1);
        assert!(matches!(
            viewer_rx.try_recv().unwrap(),
            ServerMessage::StartQa
        ));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_unjoined_connections_receive_nothing() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (_pending, mut pending_rx) = connect(&registry);

        registry.broadcast_except("ev-1", streamer, ServerMessage::StartQa);
        assert!(pending_rx.try_recv().is_err());
    }

    #[test]
    fn test_payload_relayed_unmodified() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (_viewer, mut viewer_rx) = join(&registry, "ev-1", Role::Viewer);

        let candidate = json!({
            "candidate": "candidate:1 1 UDP 2122252543 192.0.2.1 54321 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        });
        registry.broadcast_except(
            "ev-1",
            streamer,
            ServerMessage::IceCandidate(candidate.clone()),
        );

        match viewer_rx.try_recv().unwrap() {
            ServerMessage::IceCandidate(v) => assert_eq!(v, candidate),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_all_includes_sender() {
        let registry = ConnectionRegistry::new();
        let (_voter, mut voter_rx) = join(&registry, "ev-1", Role::Viewer);
        let (_streamer, mut streamer_rx) = join(&registry, "ev-1", Role::Streamer);

        let delivered = registry.broadcast_all(
            "ev-1",
            ServerMessage::NewVote {
                option: "A".to_string(),
            },
        );

        assert_eq!(delivered, 2);
        assert!(voter_rx.try_recv().is_ok());
        assert!(streamer_rx.try_recv().is_ok());
    }

    #[test]
    fn test_stale_entries_removed_on_failed_send() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (gone, gone_rx) = join(&registry, "ev-1", Role::Viewer);
        let (_alive, mut alive_rx) = join(&registry, "ev-1", Role::Viewer);

        // Simulate an abrupt disconnect without an unregister call
        drop(gone_rx);
        assert_eq!(registry.connection_count(), 3);

        let delivered = registry.broadcast_except("ev-1", streamer, ServerMessage::StartQa);

        assert_eq!(delivered, 1);
        assert!(alive_rx.try_recv().is_ok());
        // Lazy cleanup kicked in
        assert_eq!(registry.connection_count(), 2);
        assert!(registry.membership(gone).is_none());
    }

    #[test]
    fn test_disconnect_leaves_rest_of_session_intact() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (viewer_a, _viewer_a_rx) = join(&registry, "ev-1", Role::Viewer);
        let (_viewer_b, mut viewer_b_rx) = join(&registry, "ev-1", Role::Viewer);

        registry.unregister(viewer_a);

        let candidate = ServerMessage::IceCandidate(json!({"candidate": "candidate:2"}));
        let delivered = registry.broadcast_except("ev-1", streamer, candidate);
        assert_eq!(delivered, 1);
        assert!(viewer_b_rx.try_recv().is_ok());

        let caption = ServerMessage::Subtitle("still here".to_string());
        assert_eq!(registry.broadcast_except("ev-1", streamer, caption), 1);
    }

    #[test]
    fn test_handshake_tracking() {
        let registry = ConnectionRegistry::new();
        let (streamer, _rx) = join(&registry, "ev-1", Role::Streamer);
        let (viewer, _viewer_rx) = join(&registry, "ev-1", Role::Viewer);

        registry.note_viewer_ready(viewer);
        registry.note_offer_broadcast("ev-1", streamer);
        registry.note_answer_sent(viewer);

        let status = registry.status();
        assert_eq!(status.sessions.len(), 1);
        assert_eq!(
            status.sessions[0].viewer_states,
            vec![ViewerHandshake::AnswerSent]
        );
    }

    #[test]
    fn test_timestamps_tracked() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = join(&registry, "ev-1", Role::Viewer);

        registry.touch(id);
        assert!(registry.idle_secs(id).unwrap() <= 1);
        assert!(registry.connected_secs(id).unwrap() <= 1);

        registry.unregister(id);
        assert!(registry.idle_secs(id).is_none());
    }

    #[test]
    fn test_status_counts() {
        let registry = ConnectionRegistry::new();
        let (_s, _rx1) = join(&registry, "ev-1", Role::Streamer);
        let (_v1, _rx2) = join(&registry, "ev-1", Role::Viewer);
        let (_v2, _rx3) = join(&registry, "ev-2", Role::Viewer);
        let (_pending, _rx4) = connect(&registry);

        let status = registry.status();
        assert_eq!(status.connections, 4);
        assert_eq!(status.joined, 3);
        assert_eq!(status.sessions.len(), 2);
        assert_eq!(status.sessions[0].session, "ev-1");
        assert_eq!(status.sessions[0].streamers, 1);
        assert_eq!(status.sessions[0].viewers, 1);
    }
}
