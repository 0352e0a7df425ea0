//! Relay counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live counters shared by the ingest path and the control surface
#[derive(Debug)]
pub struct RelayCounters {
    started_at: Instant,
    samples_received: AtomicU64,
    samples_unrecognized: AtomicU64,
    samples_buffered: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    batches_flushed: AtomicU64,
    batches_failed: AtomicU64,
    values_persisted: AtomicU64,
    values_discarded: AtomicU64,
    values_lost: AtomicU64,
    sessions_started: AtomicU64,
    sessions_finished: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            samples_received: AtomicU64::new(0),
            samples_unrecognized: AtomicU64::new(0),
            samples_buffered: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            values_persisted: AtomicU64::new(0),
            values_discarded: AtomicU64::new(0),
            values_lost: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            sessions_finished: AtomicU64::new(0),
        }
    }

    pub fn sample_received(&self, recognized: bool) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
        if !recognized {
            self.samples_unrecognized.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn sample_buffered(&self) {
        self.samples_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_fanned_out(&self, delivered: usize, dropped: usize) {
        self.frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.frames_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Record a successful flush
    pub fn batch_flushed(&self, persisted: usize, discarded: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.values_persisted
            .fetch_add(persisted as u64, Ordering::Relaxed);
        self.values_discarded
            .fetch_add(discarded as u64, Ordering::Relaxed);
    }

    /// Record a failed flush; its values are gone
    pub fn batch_failed(&self, lost: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.values_lost.fetch_add(lost as u64, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_finished(&self) {
        self.sessions_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            uptime: self.started_at.elapsed(),
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_unrecognized: self.samples_unrecognized.load(Ordering::Relaxed),
            samples_buffered: self.samples_buffered.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            values_persisted: self.values_persisted.load(Ordering::Relaxed),
            values_discarded: self.values_discarded.load(Ordering::Relaxed),
            values_lost: self.values_lost.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_finished: self.sessions_finished.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay-wide statistics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Time since the counters were created
    #[serde(serialize_with = "as_secs")]
    pub uptime: Duration,
    /// Device messages received
    pub samples_received: u64,
    /// Device messages without a numeric value
    pub samples_unrecognized: u64,
    /// Values appended to a session buffer
    pub samples_buffered: u64,
    /// Frames queued to viewers
    pub frames_delivered: u64,
    /// Frames dropped on full viewer queues
    pub frames_dropped: u64,
    /// Flushes that reached storage
    pub batches_flushed: u64,
    /// Flushes that failed
    pub batches_failed: u64,
    /// Values written to storage
    pub values_persisted: u64,
    /// Values dropped by the storage cap
    pub values_discarded: u64,
    /// Values lost to failed flushes
    pub values_lost: u64,
    /// Recording sessions started
    pub sessions_started: u64,
    /// Recording sessions torn down
    pub sessions_finished: u64,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
