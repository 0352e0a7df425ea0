//! In-process record store
//!
//! Keeps every document in memory behind `RwLock`s. Used by the server binary
//! when no external database is configured, and by tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::record::{ArrayId, ArrayRecord, DevicePatch, DeviceRecord, RecordPatch, SessionRecord};
use super::store::RecordStore;

/// Record store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    arrays: RwLock<HashMap<ArrayId, Vec<f64>>>,
    /// Insertion order doubles as timestamp order
    records: RwLock<Vec<SessionRecord>>,
    devices: RwLock<BTreeMap<String, DeviceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored array documents
    pub async fn array_count(&self) -> usize {
        self.arrays.read().await.len()
    }

    /// Number of stored metadata records
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Number of registered devices
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_array(&self, data: Vec<f64>) -> Result<ArrayId, StorageError> {
        let id = ArrayId::new();
        self.arrays.write().await.insert(id, data);
        Ok(id)
    }

    async fn push_array(&self, id: &ArrayId, values: Vec<f64>) -> Result<ArrayRecord, StorageError> {
        let mut arrays = self.arrays.write().await;
        let data = arrays
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("array {}", id)))?;
        data.extend(values);

        Ok(ArrayRecord {
            id: *id,
            data: data.clone(),
        })
    }

    async fn get_array(&self, id: &ArrayId) -> Result<ArrayRecord, StorageError> {
        self.arrays
            .read()
            .await
            .get(id)
            .map(|data| ArrayRecord {
                id: *id,
                data: data.clone(),
            })
            .ok_or_else(|| StorageError::NotFound(format!("array {}", id)))
    }

    async fn delete_array(&self, id: &ArrayId) -> Result<(), StorageError> {
        self.arrays
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("array {}", id)))
    }

    async fn insert_record(&self, record: SessionRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.session_id == record.session_id) {
            return Err(StorageError::Conflict(format!("session {}", record.session_id)));
        }
        records.push(record);
        Ok(())
    }

    async fn list_records(&self, device_id: &str) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn find_record(&self, session_id: &str) -> Result<SessionRecord, StorageError> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.session_id == session_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("session {}", session_id)))
    }

    async fn patch_record(
        &self,
        session_id: &str,
        patch: RecordPatch,
    ) -> Result<SessionRecord, StorageError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.session_id == session_id)
            .ok_or_else(|| StorageError::NotFound(format!("session {}", session_id)))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn insert_device(&self, device: DeviceRecord) -> Result<(), StorageError> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.device_id) {
            return Err(StorageError::Conflict(format!("device {}", device.device_id)));
        }
        devices.insert(device.device_id.clone(), device);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn find_device(&self, device_id: &str) -> Result<DeviceRecord, StorageError> {
        self.devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("device {}", device_id)))
    }

    async fn update_device(
        &self,
        device_id: &str,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, StorageError> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| StorageError::NotFound(format!("device {}", device_id)))?;
        patch.apply(device);
        Ok(device.clone())
    }

    async fn delete_device(&self, device_id: &str) -> Result<(), StorageError> {
        self.devices
            .write()
            .await
            .remove(device_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("device {}", device_id)))
    }
}
