//! Connection handles and the frames routed through them
//!
//! This module defines the key type for identifying devices and the
//! messages pushed onto each connection's outbound queue.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::error::RegistryError;

/// Identifier of a producing device, assigned outside the relay
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse a device identifier, rejecting blank values
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::MissingDeviceId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-unique identifier of one live connection
pub type ConnectionId = u64;

/// Why the registry closed a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Viewer removed to make room for a newer viewer
    Evicted,
    /// Device connection replaced by a newer connection for the same id
    Superseded,
    /// Viewer attached to a device that has no live connection
    DeviceNotActive,
}

impl CloseReason {
    /// Human-readable reason sent with the close frame
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Evicted => "viewer limit reached",
            CloseReason::Superseded => "superseded by a newer connection",
            CloseReason::DeviceNotActive => "device not active",
        }
    }
}

/// Message pushed onto a connection's outbound queue
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Verbatim device payload
    Frame(Arc<str>),
    /// Close the socket with the given reason
    Close(CloseReason),
}

/// Registry-side handle of a connection
///
/// Cloning is cheap; every clone feeds the same queue. The socket task holding
/// the matching receiver observes `None` once all handles are dropped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its socket task drains
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the socket task has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a frame without waiting
    pub(super) fn try_deliver(&self, frame: Arc<str>) -> Delivery {
        match self.tx.try_send(Outbound::Frame(frame)) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Ask the socket task to close
    ///
    /// If the queue is full the close is dropped; the task still ends once the
    /// registry drops its handle and the queue drains.
    pub(super) fn close(&self, reason: CloseReason) {
        let _ = self.tx.try_send(Outbound::Close(reason));
    }
}

/// Result of queueing one frame on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    Sent,
    Full,
    Closed,
}

/// Result of fanning one frame out to a device's viewers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Viewers that accepted the frame
    pub delivered: usize,
    /// Viewers whose queue was full
    pub dropped: usize,
    /// Viewers whose socket task had already ended
    pub closed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_parse() {
        let id = DeviceId::parse("  ecg-122 ").unwrap();
        assert_eq!(id.as_str(), "ecg-122");
        assert_eq!(id.to_string(), "ecg-122");

        assert_eq!(DeviceId::parse("   "), Err(RegistryError::MissingDeviceId));
        assert_eq!(DeviceId::parse(""), Err(RegistryError::MissingDeviceId));
    }

    #[tokio::test]
    async fn test_handle_delivery_states() {
        let (handle, mut rx) = ConnectionHandle::channel(7, 1);
        assert_eq!(handle.id(), 7);

        assert_eq!(handle.try_deliver(Arc::from("1.0")), Delivery::Sent);
        assert_eq!(handle.try_deliver(Arc::from("2.0")), Delivery::Full);

        assert_eq!(rx.recv().await, Some(Outbound::Frame(Arc::from("1.0"))));

        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(handle.try_deliver(Arc::from("3.0")), Delivery::Closed);
    }
}
