//! Persisted document shapes
//!
//! Two collections back a recording: an array document holding the samples
//! and a metadata record linking it to the device and session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;

/// Reference to a stored sample array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayId(Uuid);

impl ArrayId {
    /// Generate a fresh array reference
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a reference received from a caller
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| StorageError::InvalidId(raw.to_string()))
    }
}

impl Default for ArrayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArrayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to a metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh record reference
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored sample array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRecord {
    pub id: ArrayId,
    pub data: Vec<f64>,
}

impl ArrayRecord {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Metadata record for one recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: RecordId,
    pub device_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub array_ref: ArrayId,
    /// Recording flag as last written; readers overlay live state
    pub recording: bool,
}

impl SessionRecord {
    pub fn new(device_id: impl Into<String>, session_id: impl Into<String>, array_ref: ArrayId) -> Self {
        Self {
            id: RecordId::new(),
            device_id: device_id.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            array_ref,
            recording: true,
        }
    }
}

/// Partial update of a metadata record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub recording: Option<bool>,
}

impl RecordPatch {
    pub fn recording(recording: bool) -> Self {
        Self {
            recording: Some(recording),
        }
    }

    pub(crate) fn apply(&self, record: &mut SessionRecord) {
        if let Some(recording) = self.recording {
            record.recording = recording;
        }
    }
}

/// Registered device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: RecordId,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            device_id: device_id.into(),
            name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a device record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DevicePatch {
    pub name: Option<String>,
}

impl DevicePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub(crate) fn apply(&self, record: &mut DeviceRecord) {
        if let Some(name) = &self.name {
            record.name = Some(name.clone());
        }
        record.updated_at = Utc::now();
    }
}
