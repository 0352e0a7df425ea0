//! Recording control surface
//!
//! Owns the table of recording sessions. A device is Idle when it has no
//! entry and Recording while it has one.
//!
//! ```text
//!            enable                     enable (restart)
//!   Idle ─────────────► Recording ◄──────────────┐
//!    ▲                    │  │                    │
//!    │   disable /        │  └────────────────────┘
//!    └── disconnect ──────┘   (old buffer flushed under old session)
//!        (trailing buffer flushed, entry removed)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::registry::DeviceId;
use crate::stats::RelayCounters;
use crate::storage::{
    FlushOutcome, RecordPatch, RecordStore, SessionData, SessionRecord, StorageError,
    StorageGateway,
};

use super::config::SessionConfig;
use super::state::{SessionId, SessionState};

/// Shared handle to one device's session
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Recording status reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub device_id: String,
    pub recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl RecordingStatus {
    fn idle(id: &DeviceId) -> Self {
        Self {
            device_id: id.to_string(),
            recording: false,
            session_id: None,
        }
    }

    fn recording(id: &DeviceId, session_id: String) -> Self {
        Self {
            device_id: id.to_string(),
            recording: true,
            session_id: Some(session_id),
        }
    }
}

/// Table entry for a recording device
///
/// The id is kept outside the mutex so status reads never wait on a flush.
struct ActiveSession {
    id: SessionId,
    state: SharedSession,
}

/// Table of active recording sessions plus the storage they flush into
pub struct SessionManager {
    sessions: RwLock<HashMap<DeviceId, ActiveSession>>,
    gateway: Arc<StorageGateway>,
    counters: Arc<RelayCounters>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a manager over `store`, capped at `config.storage_cap`
    pub fn new(
        store: Arc<dyn RecordStore>,
        config: SessionConfig,
        counters: Arc<RelayCounters>,
    ) -> Self {
        let gateway = StorageGateway::with_cap(store, config.storage_cap);
        Self {
            sessions: RwLock::new(HashMap::new()),
            gateway: Arc::new(gateway),
            counters,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<StorageGateway> {
        &self.gateway
    }

    /// Start recording; restarts the session if one is already running
    pub async fn enable(&self, id: &DeviceId) -> RecordingStatus {
        let state = SessionState::new(id.clone(), self.config.flush_threshold);
        let active = ActiveSession {
            id: state.session_id(),
            state: Arc::new(Mutex::new(state)),
        };
        let session_id = active.id.to_string();

        let previous = self.sessions.write().await.insert(id.clone(), active);

        self.counters.session_started();
        tracing::info!(device = %id, session_id = %session_id, "Recording started");

        if let Some(previous) = previous {
            tracing::info!(device = %id, "Recording restarted, closing previous session");
            self.finish(previous.state).await;
        }

        RecordingStatus::recording(id, session_id)
    }

    /// Stop recording, flushing any partial buffer first
    ///
    /// Idle devices are left untouched.
    pub async fn disable(&self, id: &DeviceId) -> RecordingStatus {
        if let Some(session) = self.detach(id).await {
            self.finish(session).await;
        }
        RecordingStatus::idle(id)
    }

    /// Current recording status
    pub async fn status(&self, id: &DeviceId) -> RecordingStatus {
        match self.active_session_id(id).await {
            Some(session_id) => RecordingStatus::recording(id, session_id),
            None => RecordingStatus::idle(id),
        }
    }

    /// Session of a recording device
    pub async fn current(&self, id: &DeviceId) -> Option<SharedSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|active| Arc::clone(&active.state))
    }

    /// Session id of a recording device
    pub async fn active_session_id(&self, id: &DeviceId) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|active| active.id.to_string())
    }

    /// Whether a device is recording
    pub async fn is_recording(&self, id: &DeviceId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Remove a device's session from the table, leaving it to the caller
    pub async fn detach(&self, id: &DeviceId) -> Option<SharedSession> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|active| active.state)
    }

    /// Tear down a detached session
    ///
    /// Flushes the trailing buffer and marks the stored record as no longer
    /// recording. Failures are logged; the session is gone either way.
    pub async fn finish(&self, session: SharedSession) {
        let mut state = session.lock().await;
        if let Some(batch) = state.take_trailing() {
            self.flush(&mut state, batch).await;
        }

        let session_id = state.session_id().to_string();
        if state.storage_handle().is_some() {
            if let Err(e) = self
                .gateway
                .mark_session(&session_id, RecordPatch::recording(false))
                .await
            {
                tracing::warn!(
                    device = %state.device_id(),
                    session_id = %session_id,
                    error = %e,
                    "Failed to mark session stopped"
                );
            }
        }

        self.counters.session_finished();
        tracing::info!(
            device = %state.device_id(),
            session_id = %session_id,
            "Recording stopped"
        );
    }

    /// Flush one batch, best effort
    ///
    /// A failed batch is logged and lost; it is never re-queued.
    pub async fn flush(&self, state: &mut SessionState, batch: Vec<f64>) -> Option<FlushOutcome> {
        let len = batch.len();

        match state.flush(&self.gateway, batch).await {
            Ok(outcome) => {
                self.counters
                    .batch_flushed(outcome.persisted, outcome.discarded);
                tracing::debug!(
                    device = %state.device_id(),
                    session_id = %state.session_id(),
                    persisted = outcome.persisted,
                    discarded = outcome.discarded,
                    stored = outcome.array.len(),
                    "Batch flushed"
                );
                Some(outcome)
            }
            Err(e) => {
                self.counters.batch_failed(len);
                tracing::warn!(
                    device = %state.device_id(),
                    session_id = %state.session_id(),
                    lost = len,
                    error = %e,
                    "Batch flush failed"
                );
                None
            }
        }
    }

    /// Stored sessions of a device with live recording state overlaid
    pub async fn list_sessions(&self, id: &DeviceId) -> Result<Vec<SessionRecord>, StorageError> {
        let mut records = self.gateway.list_sessions(id.as_str()).await?;
        let active = self.active_session_id(id).await;

        for record in &mut records {
            record.recording = active.as_deref() == Some(record.session_id.as_str());
        }

        Ok(records)
    }

    /// Stored session with samples and live recording state overlaid
    pub async fn load_session(&self, session_id: &str) -> Result<SessionData, StorageError> {
        let mut data = self.gateway.load_session(session_id).await?;
        let device = DeviceId::parse(&data.record.device_id).ok();
        let active = match device {
            Some(device) => self.active_session_id(&device).await,
            None => None,
        };
        data.record.recording = active.as_deref() == Some(session_id);
        Ok(data)
    }
}
