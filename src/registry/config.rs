//! Registry configuration

/// Default maximum number of viewers attached to one device
pub const DEFAULT_MAX_VIEWERS: usize = 3;

/// Default per-connection outbound queue depth
pub const DEFAULT_CONNECTION_QUEUE: usize = 256;

/// Configuration for the connection registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum viewers per device; a new viewer beyond this evicts the others
    pub max_viewers_per_device: usize,

    /// Capacity of each connection's outbound queue
    ///
    /// Frames sent to a viewer whose queue is full are dropped for that viewer.
    pub connection_queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_viewers_per_device: DEFAULT_MAX_VIEWERS,
            connection_queue_capacity: DEFAULT_CONNECTION_QUEUE,
        }
    }
}

impl RegistryConfig {
    /// Set the viewer cap (at least one viewer is always admitted)
    pub fn max_viewers_per_device(mut self, max: usize) -> Self {
        self.max_viewers_per_device = max.max(1);
        self
    }

    /// Set the outbound queue capacity
    pub fn connection_queue_capacity(mut self, capacity: usize) -> Self {
        self.connection_queue_capacity = capacity.max(1);
        self
    }
}
