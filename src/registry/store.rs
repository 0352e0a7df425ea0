//! Connection registry implementation
//!
//! The central registry that tracks device and viewer connections and routes
//! device payloads to viewers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::entry::{DeviceEntry, RegistryStats, ViewerSet};
use super::error::RegistryError;
use super::frame::{
    BroadcastOutcome, CloseReason, ConnectionHandle, ConnectionId, Delivery, DeviceId, Outbound,
};

/// Central registry for all live connections
///
/// Thread-safe via `RwLock`. Fan-out takes only read locks, so devices never
/// block each other while streaming. Mutating one device's viewer set takes
/// that set's write lock.
pub struct ConnectionRegistry {
    /// Live device connection per identifier
    devices: RwLock<HashMap<DeviceId, DeviceEntry>>,

    /// Viewer sets per identifier; empty sets are removed
    viewers: RwLock<HashMap<DeviceId, Arc<RwLock<ViewerSet>>>>,

    /// Next connection id to hand out
    next_connection_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            viewers: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a connection handle and the receiver its socket task drains
    pub fn open_connection(&self) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        ConnectionHandle::channel(id, self.config.connection_queue_capacity)
    }

    /// Register a device connection
    ///
    /// Any previous connection for the same id is replaced and told to close.
    /// Returns the id of the superseded connection, if there was one.
    pub async fn register_device(
        &self,
        id: &DeviceId,
        connection: ConnectionHandle,
    ) -> Option<ConnectionId> {
        let connection_id = connection.id();
        let previous = self
            .devices
            .write()
            .await
            .insert(id.clone(), DeviceEntry::new(connection));

        match previous {
            Some(old) => {
                old.connection.close(CloseReason::Superseded);
                tracing::warn!(
                    device = %id,
                    connection = connection_id,
                    superseded = old.connection_id(),
                    "Device connection superseded"
                );
                Some(old.connection_id())
            }
            None => {
                tracing::info!(device = %id, connection = connection_id, "Device registered");
                None
            }
        }
    }

    /// Register a viewer for a device
    ///
    /// Viewers of a device without a live connection are told to close and
    /// rejected. At capacity, every existing viewer is evicted before the new
    /// one is admitted. Returns the number of evicted viewers.
    pub async fn register_viewer(
        &self,
        id: &DeviceId,
        connection: ConnectionHandle,
    ) -> Result<usize, RegistryError> {
        // Held until the viewer is admitted so the device cannot be removed
        // in between. Lock order is devices then viewers.
        let devices = self.devices.read().await;
        if !devices.contains_key(id) {
            connection.close(CloseReason::DeviceNotActive);
            tracing::info!(device = %id, "Viewer rejected: device not active");
            return Err(RegistryError::DeviceNotActive(id.clone()));
        }

        let connection_id = connection.id();
        let mut viewers = self.viewers.write().await;
        let set_arc = viewers
            .entry(id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(ViewerSet::new())));
        let mut set = set_arc.write().await;

        let evicted = set.admit(connection, self.config.max_viewers_per_device);
        if evicted > 0 {
            tracing::info!(device = %id, evicted = evicted, "Viewer limit reached, evicted viewers");
        }

        tracing::info!(
            device = %id,
            connection = connection_id,
            viewers = set.len(),
            "Viewer registered"
        );

        Ok(evicted)
    }

    /// Remove a device connection
    ///
    /// Only removes the entry if `connection` is still the live connection,
    /// so a superseded socket closing late never unregisters its successor.
    pub async fn remove_device(&self, id: &DeviceId, connection: ConnectionId) -> bool {
        let mut devices = self.devices.write().await;

        match devices.get(id) {
            Some(entry) if entry.connection_id() == connection => {
                devices.remove(id);
                tracing::info!(device = %id, connection = connection, "Device removed");
                true
            }
            _ => false,
        }
    }

    /// Remove a viewer; drops the device's viewer set once empty
    pub async fn remove_viewer(&self, id: &DeviceId, connection: ConnectionId) -> bool {
        let mut viewers = self.viewers.write().await;

        let Some(set_arc) = viewers.get(id).cloned() else {
            return false;
        };

        let mut set = set_arc.write().await;
        let removed = set.remove(connection);
        if set.is_empty() {
            viewers.remove(id);
        }

        if removed {
            tracing::debug!(
                device = %id,
                connection = connection,
                viewers = set.len(),
                "Viewer removed"
            );
        }

        removed
    }

    /// Apply `f` to a snapshot of the device's viewers
    ///
    /// Returns the number of viewers visited.
    pub async fn for_each_viewer<F>(&self, id: &DeviceId, mut f: F) -> usize
    where
        F: FnMut(&ConnectionHandle),
    {
        let snapshot = self.viewer_snapshot(id).await;
        for viewer in &snapshot {
            f(viewer);
        }
        snapshot.len()
    }

    /// Fan a payload out to every viewer of a device
    pub async fn broadcast(&self, id: &DeviceId, frame: Arc<str>) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        self.for_each_viewer(id, |viewer| match viewer.try_deliver(Arc::clone(&frame)) {
            Delivery::Sent => outcome.delivered += 1,
            Delivery::Full => outcome.dropped += 1,
            Delivery::Closed => outcome.closed += 1,
        })
        .await;

        if outcome.dropped > 0 {
            tracing::debug!(device = %id, dropped = outcome.dropped, "Viewer queue full, frame dropped");
        }

        if let Some(entry) = self.devices.read().await.get(id) {
            entry.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        }

        outcome
    }

    async fn viewer_snapshot(&self, id: &DeviceId) -> Vec<ConnectionHandle> {
        let set_arc = match self.viewers.read().await.get(id) {
            Some(set) => Arc::clone(set),
            None => return Vec::new(),
        };
        let set = set_arc.read().await;
        set.snapshot()
    }

    /// Check if a device has a live connection
    pub async fn has_device(&self, id: &DeviceId) -> bool {
        self.devices.read().await.contains_key(id)
    }

    /// Check if `connection` is the device's live connection
    pub async fn is_current_device(&self, id: &DeviceId, connection: ConnectionId) -> bool {
        self.devices
            .read()
            .await
            .get(id)
            .is_some_and(|entry| entry.connection_id() == connection)
    }

    /// Number of viewers attached to a device
    pub async fn viewer_count(&self, id: &DeviceId) -> usize {
        let set_arc = match self.viewers.read().await.get(id) {
            Some(set) => Arc::clone(set),
            None => return 0,
        };
        let count = set_arc.read().await.len();
        count
    }

    /// Whether the device has a viewer set at all
    pub async fn has_viewer_set(&self, id: &DeviceId) -> bool {
        self.viewers.read().await.contains_key(id)
    }

    /// Number of live device connections
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Get device statistics
    pub async fn stats(&self, id: &DeviceId) -> RegistryStats {
        let devices = self.devices.read().await;
        let set_arc = self.viewers.read().await.get(id).cloned();

        match set_arc {
            Some(set_arc) => {
                let set = set_arc.read().await;
                RegistryStats::collect(devices.get(id), Some(&set))
            }
            None => RegistryStats::collect(devices.get(id), None),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceId {
        DeviceId::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_register_device() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");

        let (conn, _rx) = registry.open_connection();
        let conn_id = conn.id();
        assert_eq!(registry.register_device(&id, conn).await, None);
        assert!(registry.has_device(&id).await);
        assert!(registry.is_current_device(&id, conn_id).await);
        assert_eq!(registry.device_count().await, 1);
    }

    #[tokio::test]
    async fn test_device_superseded() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");

        let (first, mut first_rx) = registry.open_connection();
        let first_id = first.id();
        registry.register_device(&id, first).await;

        let (second, _second_rx) = registry.open_connection();
        let second_id = second.id();
        assert_eq!(registry.register_device(&id, second).await, Some(first_id));

        // Old socket is told to close
        assert_eq!(
            first_rx.recv().await,
            Some(Outbound::Close(CloseReason::Superseded))
        );
        // Registry dropped its handle, so the queue ends
        assert_eq!(first_rx.recv().await, None);

        // Late disconnect of the old socket leaves the new one in place
        assert!(!registry.remove_device(&id, first_id).await);
        assert!(registry.is_current_device(&id, second_id).await);
        assert_eq!(registry.device_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_device_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");

        let (conn, _rx) = registry.open_connection();
        let conn_id = conn.id();
        registry.register_device(&id, conn).await;

        assert!(registry.remove_device(&id, conn_id).await);
        assert!(!registry.remove_device(&id, conn_id).await);
        assert!(!registry.has_device(&id).await);
    }

    #[tokio::test]
    async fn test_viewer_rejected_without_device() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");

        let (viewer, mut rx) = registry.open_connection();
        let result = registry.register_viewer(&id, viewer).await;

        assert_eq!(result, Err(RegistryError::DeviceNotActive(id.clone())));
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close(CloseReason::DeviceNotActive))
        );
        assert!(!registry.has_viewer_set(&id).await);
    }

    #[tokio::test]
    async fn test_viewer_eviction() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");
        let (dev, _dev_rx) = registry.open_connection();
        registry.register_device(&id, dev).await;

        let mut old_receivers = Vec::new();
        for _ in 0..3 {
            let (viewer, rx) = registry.open_connection();
            assert_eq!(registry.register_viewer(&id, viewer).await, Ok(0));
            old_receivers.push(rx);
        }
        assert_eq!(registry.viewer_count(&id).await, 3);

        let (v4, _v4_rx) = registry.open_connection();
        let v4_id = v4.id();
        assert_eq!(registry.register_viewer(&id, v4).await, Ok(3));

        for mut rx in old_receivers {
            assert_eq!(rx.recv().await, Some(Outbound::Close(CloseReason::Evicted)));
            assert_eq!(rx.recv().await, None);
        }

        assert_eq!(registry.viewer_count(&id).await, 1);
        let mut remaining = Vec::new();
        registry
            .for_each_viewer(&id, |v| remaining.push(v.id()))
            .await;
        assert_eq!(remaining, vec![v4_id]);
    }

    #[tokio::test]
    async fn test_remove_last_viewer_drops_set() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");
        let (dev, _dev_rx) = registry.open_connection();
        registry.register_device(&id, dev).await;

        let (viewer, _rx) = registry.open_connection();
        let viewer_id = viewer.id();
        registry.register_viewer(&id, viewer).await.unwrap();
        assert!(registry.has_viewer_set(&id).await);

        assert!(registry.remove_viewer(&id, viewer_id).await);
        assert!(!registry.has_viewer_set(&id).await);
        assert!(!registry.remove_viewer(&id, viewer_id).await);
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_and_full_viewers() {
        let config = RegistryConfig::default().connection_queue_capacity(1);
        let registry = ConnectionRegistry::with_config(config);
        let id = device("ecg-1");
        let (dev, _dev_rx) = registry.open_connection();
        registry.register_device(&id, dev).await;

        let (live, mut live_rx) = registry.open_connection();
        let (dead, dead_rx) = registry.open_connection();
        let (slow, _slow_rx) = registry.open_connection();
        registry.register_viewer(&id, live).await.unwrap();
        registry.register_viewer(&id, dead).await.unwrap();
        registry.register_viewer(&id, slow).await.unwrap();
        drop(dead_rx);

        let first = registry.broadcast(&id, Arc::from("1")).await;
        assert_eq!(first.delivered, 2);
        assert_eq!(first.closed, 1);

        assert_eq!(live_rx.recv().await, Some(Outbound::Frame(Arc::from("1"))));

        // The slow viewer never drained its single slot
        let second = registry.broadcast(&id, Arc::from("2")).await;
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(second.closed, 1);
        assert_eq!(live_rx.recv().await, Some(Outbound::Frame(Arc::from("2"))));

        let stats = registry.stats(&id).await;
        assert!(stats.has_device);
        assert_eq!(stats.viewer_count, 3);
        assert_eq!(stats.frames_forwarded, 2);
    }

    #[tokio::test]
    async fn test_device_removal_waits_for_viewer_admission() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = device("ecg-1");
        let (dev, _dev_rx) = registry.open_connection();
        let dev_id = dev.id();
        registry.register_device(&id, dev).await;

        // Park the admission on the viewer map
        let viewers_guard = registry.viewers.write().await;

        let (viewer, _viewer_rx) = registry.open_connection();
        let viewer_id = viewer.id();
        let admit = tokio::spawn({
            let registry = Arc::clone(&registry);
            let id = id.clone();
            async move { registry.register_viewer(&id, viewer).await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        let remove = tokio::spawn({
            let registry = Arc::clone(&registry);
            let id = id.clone();
            async move { registry.remove_device(&id, dev_id).await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(!remove.is_finished());
        assert!(!admit.is_finished());

        drop(viewers_guard);
        assert_eq!(admit.await.unwrap(), Ok(0));
        assert!(remove.await.unwrap());

        // Once the device is gone, new viewers are rejected with no entry
        assert!(registry.remove_viewer(&id, viewer_id).await);
        let (late, _late_rx) = registry.open_connection();
        assert!(registry.register_viewer(&id, late).await.is_err());
        assert!(!registry.has_viewer_set(&id).await);
    }

    #[tokio::test]
    async fn test_broadcast_without_viewers() {
        let registry = ConnectionRegistry::new();
        let id = device("ecg-1");

        let outcome = registry.broadcast(&id, Arc::from("1")).await;
        assert_eq!(outcome, BroadcastOutcome::default());
    }
}
