//! Crate-level error type

use crate::auth::AuthError;
use crate::registry::RegistryError;
use crate::storage::StorageError;

/// Errors surfaced by the relay
#[derive(Debug)]
pub enum Error {
    /// Socket bind or serve failure
    Io(std::io::Error),
    Registry(RegistryError),
    Storage(StorageError),
    Auth(AuthError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Auth(e) => write!(f, "Auth error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Auth(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Error::Registry(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;
