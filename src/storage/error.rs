//! Storage error types

/// Error type for persistent store operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Identifier could not be parsed as a document reference
    InvalidId(String),
    /// Referenced document does not exist
    NotFound(String),
    /// A record with the same key already exists
    Conflict(String),
    /// Backend failed (network, I/O, serialization)
    Backend(String),
}

impl StorageError {
    /// Malformed and missing references are both "not found" to callers
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::InvalidId(_) | StorageError::NotFound(_))
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::InvalidId(id) => write!(f, "Invalid document id: {}", id),
            StorageError::NotFound(what) => write!(f, "Not found: {}", what),
            StorageError::Conflict(what) => write!(f, "Already exists: {}", what),
            StorageError::Backend(msg) => write!(f, "Storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}
