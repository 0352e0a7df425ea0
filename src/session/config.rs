//! Recording session configuration

use crate::storage::DEFAULT_STORAGE_CAP;

/// Default flush threshold: about two seconds of a 125 Hz device
pub const DEFAULT_FLUSH_THRESHOLD: usize = 250;

/// Configuration for recording sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffered values that trigger a flush
    pub flush_threshold: usize,

    /// Maximum values stored per session array
    pub storage_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            storage_cap: DEFAULT_STORAGE_CAP,
        }
    }
}

impl SessionConfig {
    /// Set the flush threshold (minimum one value)
    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    /// Set the per-session storage cap
    pub fn storage_cap(mut self, cap: usize) -> Self {
        self.storage_cap = cap;
        self
    }

    /// Derive the threshold from a device sample rate and a flush interval
    pub fn for_sample_rate(mut self, hz: u32, flush_every_secs: f64) -> Self {
        let samples = (f64::from(hz) * flush_every_secs).round() as usize;
        self.flush_threshold = samples.max(1);
        self
    }
}
