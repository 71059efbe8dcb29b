use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use crate::models::message::ChatMessage;

/// A frame the core hands to a session's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Public chat message from the `messages` topic.
    Chat(Arc<ChatMessage>),
    /// Message addressed to this session's private queue.
    Private(Arc<ChatMessage>),
    /// Full snapshot of the active nicknames, sorted.
    Users(Arc<Vec<String>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Bound,
    Disconnected,
}

/// Result of pushing one frame at a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Outbound queue full. The frame is discarded for this session only.
    Dropped,
    /// Session is gone or its transport stopped reading.
    Closed,
}

/// One live client connection, independent of the nickname it may bind.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    nickname: Mutex<Option<String>>,
    live: AtomicBool,
    dropped: AtomicU64,
    tx: mpsc::Sender<Outbound>,
    closed: Notify,
}

impl Session {
    pub fn new(session_id: String, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            session_id,
            nickname: Mutex::new(None),
            live: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
            tx,
            closed: Notify::new(),
        }
    }

    pub fn nickname(&self) -> Option<String> {
        self.nickname.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        if !self.is_live() {
            SessionState::Disconnected
        } else if self.nickname.lock().is_some() {
            SessionState::Bound
        } else {
            SessionState::Connected
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Frames discarded because the outbound queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn bind(&self, nickname: String) -> Option<String> {
        self.nickname.lock().replace(nickname)
    }

    pub(crate) fn unbind(&self) -> Option<String> {
        self.nickname.lock().take()
    }

    /// Non-blocking push onto the outbound queue.
    pub fn deliver(&self, frame: Outbound) -> Delivery {
        if !self.is_live() {
            return Delivery::Closed;
        }
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Mark the session dead and wake its transport. Idempotent.
    ///
    /// Returns `true` the first time it is called.
    pub(crate) fn close(&self) -> bool {
        let was_live = self.live.swap(false, Ordering::AcqRel);
        if was_live {
            self.closed.notify_one();
        }
        was_live
    }

    /// Resolves once the core has closed this session, e.g. because another
    /// connection entered with the same nickname.
    pub async fn closed(&self) {
        if !self.is_live() {
            return;
        }
        self.closed.notified().await;
    }
}

#[cfg(test)]
pub(crate) fn test_session(id: &str, capacity: usize) -> (Arc<Session>, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Arc::new(Session::new(id.to_string(), tx)), rx)
}
