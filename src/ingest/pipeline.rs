//! Device ingest pipeline
//!
//! Each device connection runs its own task that feeds messages into
//! [`IngestPipeline::on_sample`] one at a time. That ordering is what keeps
//! the buffer-then-flush sequence of a session free of races: only this path
//! appends to a live session's stored array.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::registry::{ConnectionId, ConnectionRegistry, DeviceId};
use crate::session::SessionManager;
use crate::stats::RelayCounters;
use crate::storage::FlushOutcome;

use super::sample::Sample;

/// What happened to one device message
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    /// Parsed payload
    pub sample: Sample,
    /// Viewers that accepted the frame
    pub delivered: usize,
    /// Whether the value was appended to a recording buffer
    pub buffered: bool,
    /// Flush triggered by this sample, if it filled the buffer and succeeded
    pub flushed: Option<FlushOutcome>,
}

/// Routes device samples to viewers and recording sessions
pub struct IngestPipeline {
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionManager>,
    counters: Arc<RelayCounters>,
}

impl IngestPipeline {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sessions: Arc<SessionManager>,
        counters: Arc<RelayCounters>,
    ) -> Self {
        Self {
            registry,
            sessions,
            counters,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Handle one device message
    ///
    /// The raw payload goes to viewers verbatim whatever its shape. Only
    /// numeric samples of a recording device are buffered; nothing here
    /// returns an error to the device loop.
    pub async fn on_sample(&self, device_id: &DeviceId, raw: &str) -> SampleOutcome {
        let sample = Sample::parse(raw);
        self.counters.sample_received(sample.value().is_some());

        let fanout = self.registry.broadcast(device_id, Arc::from(raw)).await;
        self.counters
            .frames_fanned_out(fanout.delivered, fanout.dropped);

        let mut outcome = SampleOutcome {
            sample,
            delivered: fanout.delivered,
            buffered: false,
            flushed: None,
        };

        let Some(value) = sample.value() else {
            tracing::debug!(device = %device_id, "Unrecognized sample skipped");
            return outcome;
        };

        let Some(session) = self.sessions.current(device_id).await else {
            return outcome;
        };

        let mut state = session.lock().await;
        if state.is_closed() {
            return outcome;
        }

        let batch = state.push(value);
        outcome.buffered = true;
        self.counters.sample_buffered();

        if let Some(batch) = batch {
            outcome.flushed = self.sessions.flush(&mut state, batch).await;
        }

        outcome
    }

    /// Handle one message read from device connection `connection`
    ///
    /// Messages from a connection that has been superseded are dropped and
    /// `None` is returned, so a replaced socket cannot feed the successor's
    /// viewers or session.
    pub async fn on_device_message(
        &self,
        device_id: &DeviceId,
        connection: ConnectionId,
        raw: &str,
    ) -> Option<SampleOutcome> {
        if !self.registry.is_current_device(device_id, connection).await {
            tracing::debug!(
                device = %device_id,
                connection = connection,
                "Message from superseded connection dropped"
            );
            return None;
        }
        Some(self.on_sample(device_id, raw).await)
    }

    /// Handle a device socket going away
    ///
    /// Unregisters the connection and, if the device was recording, starts the
    /// trailing flush and session teardown in a background task. The returned
    /// handle lets callers wait for it; dropping it does not cancel the flush.
    /// A connection that was already superseded leaves the successor's session
    /// alone and returns `None`.
    pub async fn on_device_disconnect(
        &self,
        device_id: &DeviceId,
        connection: ConnectionId,
    ) -> Option<JoinHandle<()>> {
        if !self.registry.remove_device(device_id, connection).await {
            tracing::debug!(
                device = %device_id,
                connection = connection,
                "Stale device connection closed"
            );
            return None;
        }

        let session = self.sessions.detach(device_id).await?;
        tracing::info!(device = %device_id, "Device disconnected while recording");

        let sessions = Arc::clone(&self.sessions);
        Some(tokio::spawn(async move {
            sessions.finish(session).await;
        }))
    }
}
