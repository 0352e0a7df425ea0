//! Per-device recording state
//!
//! A `SessionState` exists only while a device is recording. It owns the
//! sample buffer and the storage handle of the session's array document.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::registry::DeviceId;
use crate::storage::{ArrayId, FlushOutcome, StorageError, StorageGateway};

/// Opaque token identifying one recording activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Recording state of one device
#[derive(Debug)]
pub struct SessionState {
    device_id: DeviceId,
    session_id: SessionId,
    buffer: Vec<f64>,
    threshold: usize,
    storage_handle: Option<ArrayId>,
    started_at: DateTime<Utc>,
    closed: bool,
}

impl SessionState {
    /// Start a fresh session: new id, empty buffer, nothing stored yet
    pub fn new(device_id: DeviceId, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            device_id,
            session_id: SessionId::new(),
            buffer: Vec::with_capacity(threshold),
            threshold,
            storage_handle: None,
            started_at: Utc::now(),
            closed: false,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Array reference, set by the first successful flush
    pub fn storage_handle(&self) -> Option<ArrayId> {
        self.storage_handle
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Values waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the session was torn down; closed sessions accept no values
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append a value; returns the full batch once the threshold is reached
    ///
    /// The returned batch is already removed from the buffer, so the buffer is
    /// empty whatever the flush outcome.
    pub fn push(&mut self, value: f64) -> Option<Vec<f64>> {
        if self.closed {
            return None;
        }

        self.buffer.push(value);
        if self.buffer.len() >= self.threshold {
            Some(std::mem::replace(
                &mut self.buffer,
                Vec::with_capacity(self.threshold),
            ))
        } else {
            None
        }
    }

    /// Close the session and hand back any partial buffer
    pub fn take_trailing(&mut self) -> Option<Vec<f64>> {
        self.closed = true;
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Write a batch: create the stored session on first flush, append after
    pub async fn flush(
        &mut self,
        gateway: &StorageGateway,
        batch: Vec<f64>,
    ) -> Result<FlushOutcome, StorageError> {
        match self.storage_handle {
            Some(handle) => gateway.append_batch(&handle, batch).await,
            None => {
                let session_id = self.session_id.to_string();
                let outcome = gateway
                    .create_session(self.device_id.as_str(), &session_id, batch)
                    .await?;
                self.storage_handle = Some(outcome.handle());
                Ok(outcome)
            }
        }
    }
}
