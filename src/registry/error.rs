//! Registry error types

use super::frame::DeviceId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Device identifier was missing or blank
    MissingDeviceId,
    /// Viewer tried to attach to a device with no live connection
    DeviceNotActive(DeviceId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::MissingDeviceId => write!(f, "Missing device identifier"),
            RegistryError::DeviceNotActive(id) => write!(f, "Device not active: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}
