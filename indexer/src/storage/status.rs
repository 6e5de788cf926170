//! # Status Channel
//!
//! Outbound notifications for whoever supervises the indexer: connect
//! outcome, committed blocks, and operation failures. Delivery is a plain
//! `tokio::sync::broadcast`; with no subscribers, messages are dropped.

use std::fmt;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::STATUS_CHANNEL_CAPACITY;

/// One status notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusMessage {
    /// The connection pool is up.
    Connected,
    /// The pool could not be created. Carries the rendered error.
    ConnectFailed(String),
    /// A block at this height was committed.
    BlockAdded(u32),
    /// A save or query failed. The error was also returned to the caller.
    DatabaseError(String),
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "database connected"),
            Self::ConnectFailed(e) => write!(f, "database connect failed: {e}"),
            Self::BlockAdded(height) => write!(f, "block {height} added"),
            Self::DatabaseError(e) => write!(f, "database error: {e}"),
        }
    }
}

/// Sending half of the status channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct StatusChannel {
    tx: broadcast::Sender<StatusMessage>,
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new(STATUS_CHANNEL_CAPACITY)
    }
}

impl StatusChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver that sees every message emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.tx.subscribe()
    }

    /// Deliver a message to all current subscribers.
    pub fn emit(&self, message: StatusMessage) {
        match &message {
            StatusMessage::ConnectFailed(_) | StatusMessage::DatabaseError(_) => {
                warn!(%message, "status")
            }
            _ => debug!(%message, "status"),
        }
        // No receivers is fine.
        let _ = self.tx.send(message);
    }
}
