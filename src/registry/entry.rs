//! Per-device registry entries
//!
//! This module defines the state stored in the registry for each device
//! identifier: the live device connection and the attached viewers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::frame::{CloseReason, ConnectionHandle, ConnectionId};

/// Live device connection for one identifier
#[derive(Debug)]
pub struct DeviceEntry {
    /// Handle of the producing connection
    pub connection: ConnectionHandle,

    /// When this connection registered
    pub connected_at: Instant,

    /// Frames fanned out since this connection registered
    pub frames_forwarded: AtomicU64,
}

impl DeviceEntry {
    pub(super) fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            connected_at: Instant::now(),
            frames_forwarded: AtomicU64::new(0),
        }
    }

    /// Connection identifier of the live device
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }
}

/// Ordered, bounded collection of viewers attached to one device
#[derive(Debug, Default)]
pub struct ViewerSet {
    viewers: Vec<ConnectionHandle>,
}

impl ViewerSet {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Number of attached viewers
    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    /// Whether no viewer is attached
    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Admit a viewer, evicting everyone else first when at `cap`
    ///
    /// Returns the number of evicted viewers.
    pub(super) fn admit(&mut self, viewer: ConnectionHandle, cap: usize) -> usize {
        let evicted = if self.viewers.len() >= cap {
            let evicted = self.viewers.len();
            for old in self.viewers.drain(..) {
                old.close(CloseReason::Evicted);
            }
            evicted
        } else {
            0
        };

        self.viewers.push(viewer);
        evicted
    }

    /// Remove one viewer by connection id
    pub(super) fn remove(&mut self, id: ConnectionId) -> bool {
        let before = self.viewers.len();
        self.viewers.retain(|v| v.id() != id);
        self.viewers.len() != before
    }

    /// Clone the current viewer list for delivery outside the lock
    pub(super) fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.viewers.clone()
    }
}

/// Statistics for a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Whether a device connection is live
    pub has_device: bool,
    /// Number of attached viewers
    pub viewer_count: usize,
    /// Frames fanned out from the live device connection
    pub frames_forwarded: u64,
    /// How long the live device has been connected
    pub connected_for: Option<Duration>,
}

impl RegistryStats {
    pub(super) fn collect(device: Option<&DeviceEntry>, viewers: Option<&ViewerSet>) -> Self {
        Self {
            has_device: device.is_some(),
            viewer_count: viewers.map(ViewerSet::len).unwrap_or(0),
            frames_forwarded: device
                .map(|d| d.frames_forwarded.load(Ordering::Relaxed))
                .unwrap_or(0),
            connected_for: device.map(|d| d.connected_at.elapsed()),
        }
    }
}
