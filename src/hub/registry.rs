//! Connection registry.
//!
//! Tracks connected sessions and the push capability used to reach each one.
//! Broadcasts iterate over a snapshot taken at the start of the call, so
//! sessions registering or leaving mid-broadcast neither break the iteration
//! nor get notified twice.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::TrySendError;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use super::message::Frame;

/// Opaque session identifier, generated fresh per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Delivery failures. Always local to one session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("session transport is closed")]
    Closed,

    #[error("session outbound queue is full")]
    Backlogged,

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// Capability to push a frame to one connected viewer.
///
/// Implementations must not block on the network: the hub pushes while
/// holding its ordering lock.
pub trait Push: Send + Sync {
    fn push(&self, frame: Frame) -> Result<(), TransportError>;
}

/// Outbound queue drained by a session worker. Never waits for room.
impl Push for crossbeam::channel::Sender<Frame> {
    fn push(&self, frame: Frame) -> Result<(), TransportError> {
        self.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backlogged,
            TrySendError::Disconnected(_) => TransportError::Closed,
        })
    }
}

/// A registered viewer.
pub struct Session {
    id: SessionId,
    push: Box<dyn Push>,
    connected_at: Instant,
}

impl Session {
    pub fn new(id: SessionId, push: Box<dyn Push>) -> Self {
        Self {
            id,
            push,
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn push(&self, frame: Frame) -> Result<(), TransportError> {
        self.push.push(frame)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the frame was handed to
    pub delivered: usize,
    /// Sessions whose transport rejected the frame
    pub failed: Vec<SessionId>,
    /// Backlogged sessions dropped from the registry
    pub evicted: Vec<SessionId>,
}

/// Set of currently connected sessions.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<FxHashMap<SessionId, Arc<Session>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session.
    pub fn register(&self, id: SessionId, push: Box<dyn Push>) {
        let session = Arc::new(Session::new(id, push));
        let mut sessions = self.sessions.write();
        sessions.insert(id, session);
        crate::debug!("hub"; "registered {} (total: {})", id, sessions.len());
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(&id);
        if removed.is_some() {
            crate::debug!("hub"; "unregistered {} (total: {})", id, sessions.len());
        }
        removed
    }

    /// Push a frame to one session. Failure does not unregister it.
    pub fn send_to(&self, id: SessionId, frame: Frame) -> Result<(), TransportError> {
        let session = self
            .sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(TransportError::UnknownSession(id))?;
        session.push(frame)
    }

    /// Push a frame to every session registered when the call starts.
    ///
    /// A session whose queue is full has missed this frame, so it is
    /// unregistered. Dropping its queue ends the session worker, and the
    /// viewer reconnects for a fresh `initial_data`.
    pub fn broadcast(&self, frame: &Frame) -> BroadcastReport {
        let snapshot = self.snapshot();
        let mut report = BroadcastReport::default();

        for session in snapshot {
            match session.push(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TransportError::Backlogged) => {
                    crate::log!("hub"; "session {} is not keeping up, dropping it", session.id());
                    self.unregister(session.id());
                    report.failed.push(session.id());
                    report.evicted.push(session.id());
                }
                Err(e) => {
                    crate::debug!("hub"; "send to {} failed: {}", session.id(), e);
                    report.failed.push(session.id());
                }
            }
        }

        report
    }

    /// Ask every session to close, then forget them all.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &drained {
            let _ = session.push(Frame::Close);
        }
        drained.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Stable copy of the session set; the lock is released before sending.
    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }
}
