//! Storage gateway
//!
//! Translates buffer flushes into the two persistence operations, create
//! with initial data and append to existing, and enforces the per-array
//! length cap. Also serves the read side used by the query endpoints.

use std::sync::Arc;

use serde::Serialize;

use super::error::StorageError;
use super::record::{ArrayId, ArrayRecord, DevicePatch, DeviceRecord, RecordPatch, SessionRecord};
use super::store::RecordStore;

/// Default maximum length of one stored array
pub const DEFAULT_STORAGE_CAP: usize = 2000;

/// Result of one create or append
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    /// Array document after the write
    pub array: ArrayRecord,
    /// Values written by this call
    pub persisted: usize,
    /// Values discarded by the cap
    pub discarded: usize,
}

impl FlushOutcome {
    /// Array reference to use for later appends
    pub fn handle(&self) -> ArrayId {
        self.array.id
    }
}

/// Metadata record plus the stored samples
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub data: Vec<f64>,
}

/// Capped adapter over a [`RecordStore`]
pub struct StorageGateway {
    store: Arc<dyn RecordStore>,
    cap: usize,
}

impl StorageGateway {
    /// Create a gateway with a custom cap
    pub fn with_cap(store: Arc<dyn RecordStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    /// Maximum length of one stored array
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Persist a new session seeded with `initial_batch`
    ///
    /// Writes the array document first, then the metadata record pointing at it.
    /// If the record cannot be written the array is deleted again.
    pub async fn create_session(
        &self,
        device_id: &str,
        session_id: &str,
        mut initial_batch: Vec<f64>,
    ) -> Result<FlushOutcome, StorageError> {
        let discarded = initial_batch.len().saturating_sub(self.cap);
        initial_batch.truncate(self.cap);
        let persisted = initial_batch.len();

        let array_id = self.store.insert_array(initial_batch.clone()).await?;
        if let Err(e) = self
            .store
            .insert_record(SessionRecord::new(device_id, session_id, array_id))
            .await
        {
            match self.store.delete_array(&array_id).await {
                Ok(()) => tracing::debug!(array = %array_id, "Removed array of unrecorded session"),
                Err(cleanup) => tracing::warn!(
                    device = %device_id,
                    session_id = %session_id,
                    array = %array_id,
                    error = %cleanup,
                    "Orphaned array left in storage"
                ),
            }
            return Err(e);
        }

        tracing::info!(
            device = %device_id,
            session_id = %session_id,
            array = %array_id,
            persisted = persisted,
            "Session stored"
        );

        Ok(FlushOutcome {
            array: ArrayRecord {
                id: array_id,
                data: initial_batch,
            },
            persisted,
            discarded,
        })
    }

    /// Append `batch` to an existing array, up to the cap
    ///
    /// Only the leading values that fit are written. A full array is returned
    /// unmodified and the whole batch discarded.
    pub async fn append_batch(
        &self,
        handle: &ArrayId,
        mut batch: Vec<f64>,
    ) -> Result<FlushOutcome, StorageError> {
        let current = self.store.get_array(handle).await?;
        let room = self.cap.saturating_sub(current.len());

        if room == 0 {
            tracing::debug!(array = %handle, discarded = batch.len(), "Array full, batch discarded");
            return Ok(FlushOutcome {
                array: current,
                persisted: 0,
                discarded: batch.len(),
            });
        }

        let discarded = batch.len().saturating_sub(room);
        batch.truncate(room);
        let persisted = batch.len();

        let array = self.store.push_array(handle, batch).await?;

        Ok(FlushOutcome {
            array,
            persisted,
            discarded,
        })
    }

    /// Patch a session's metadata record
    pub async fn mark_session(
        &self,
        session_id: &str,
        patch: RecordPatch,
    ) -> Result<SessionRecord, StorageError> {
        self.store.patch_record(session_id, patch).await
    }

    /// Metadata records of a device, oldest first
    pub async fn list_sessions(&self, device_id: &str) -> Result<Vec<SessionRecord>, StorageError> {
        let mut records = self.store.list_records(device_id).await?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    /// Metadata record and samples of one session
    pub async fn load_session(&self, session_id: &str) -> Result<SessionData, StorageError> {
        let record = self.store.find_record(session_id).await?;
        let array = self.store.get_array(&record.array_ref).await?;
        Ok(SessionData {
            record,
            data: array.data,
        })
    }

    /// Fetch an array by a caller-supplied reference
    pub async fn fetch_array(&self, raw_ref: &str) -> Result<ArrayRecord, StorageError> {
        let id = ArrayId::parse(raw_ref)?;
        self.store.get_array(&id).await
    }

    /// Register a device
    pub async fn create_device(
        &self,
        device_id: &str,
        name: Option<String>,
    ) -> Result<DeviceRecord, StorageError> {
        if device_id.trim().is_empty() {
            return Err(StorageError::InvalidId(device_id.to_string()));
        }
        let record = DeviceRecord::new(device_id, name);
        self.store.insert_device(record.clone()).await?;
        tracing::info!(device = %device_id, "Device registered");
        Ok(record)
    }

    /// Registered devices ordered by device id
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let mut devices = self.store.list_devices().await?;
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<DeviceRecord, StorageError> {
        self.store.find_device(device_id).await
    }

    pub async fn update_device(
        &self,
        device_id: &str,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, StorageError> {
        self.store.update_device(device_id, patch).await
    }

    /// Remove a device registration; stored sessions are kept
    pub async fn delete_device(&self, device_id: &str) -> Result<(), StorageError> {
        self.store.delete_device(device_id).await?;
        tracing::info!(device = %device_id, "Device removed");
        Ok(())
    }
}
