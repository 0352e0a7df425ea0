//! Persistent store interface
//!
//! The relay only needs a handful of document operations. Implementations
//! are expected to be remote and may fail or stall at any call.

use async_trait::async_trait;

use super::error::StorageError;
use super::record::{ArrayId, ArrayRecord, DevicePatch, DeviceRecord, RecordPatch, SessionRecord};

/// Backend holding sample arrays and session metadata
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a new array document and return its reference
    async fn insert_array(&self, data: Vec<f64>) -> Result<ArrayId, StorageError>;

    /// Append values to an array document and return the updated document
    async fn push_array(&self, id: &ArrayId, values: Vec<f64>) -> Result<ArrayRecord, StorageError>;

    /// Fetch an array document
    async fn get_array(&self, id: &ArrayId) -> Result<ArrayRecord, StorageError>;

    /// Delete an array document
    async fn delete_array(&self, id: &ArrayId) -> Result<(), StorageError>;

    /// Insert a metadata record; session ids are unique
    async fn insert_record(&self, record: SessionRecord) -> Result<(), StorageError>;

    /// All metadata records of a device, oldest first
    async fn list_records(&self, device_id: &str) -> Result<Vec<SessionRecord>, StorageError>;

    /// Metadata record of a session
    async fn find_record(&self, session_id: &str) -> Result<SessionRecord, StorageError>;

    /// Update a metadata record and return it
    async fn patch_record(
        &self,
        session_id: &str,
        patch: RecordPatch,
    ) -> Result<SessionRecord, StorageError>;

    /// Insert a device record; device ids are unique
    async fn insert_device(&self, device: DeviceRecord) -> Result<(), StorageError>;

    /// All device records
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    /// Device record by device id
    async fn find_device(&self, device_id: &str) -> Result<DeviceRecord, StorageError>;

    /// Update a device record and return it
    async fn update_device(
        &self,
        device_id: &str,
        patch: DevicePatch,
    ) -> Result<DeviceRecord, StorageError>;

    /// Delete a device record
    async fn delete_device(&self, device_id: &str) -> Result<(), StorageError>;
}
