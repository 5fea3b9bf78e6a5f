//! Error types for the importer

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while copying or importing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// A destination directory could not be created or is unusable
    ResourceError,
    /// A device copy did not complete within the configured bound
    Timeout,
    /// No device found, or a required device folder is missing
    DeviceUnavailable,
    /// Operation attempted on an adapter that never reached `Ready`
    NotConnected,
    /// Cancelled by the caller
    Cancelled,
    /// Configuration could not be loaded or is inconsistent
    InvalidConfig,
}

/// Represents an error that occurred during a copy or import run
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ImportError {
    /// The kind of error
    pub kind: ImportErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ImportError {
    /// Create a new import error
    pub fn new(kind: ImportErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            ImportErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ImportErrorKind::IoError, path, message)
    }

    /// Create a resource error (destination directory unusable)
    pub fn resource(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ImportErrorKind::ResourceError, Some(path), message)
    }

    /// Create a timeout error for a device copy
    pub fn timeout(path: PathBuf, waited_ms: u64) -> Self {
        Self::new(
            ImportErrorKind::Timeout,
            Some(path),
            format!("File did not appear within {} ms", waited_ms),
        )
    }

    /// Create a device unavailable error
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::new(ImportErrorKind::DeviceUnavailable, None, message)
    }

    /// Create a not connected error
    pub fn not_connected() -> Self {
        Self::new(ImportErrorKind::NotConnected, None, "Device not connected")
    }

    /// Create a cancellation error
    pub fn cancelled(path: Option<PathBuf>) -> Self {
        Self::new(ImportErrorKind::Cancelled, path, "Operation cancelled")
    }

    /// Create a configuration error
    pub fn invalid_config(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ImportErrorKind::InvalidConfig, path, message)
    }

    /// Attach a path to an error that was converted without one
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether this error should abort the whole run rather than a single file
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self.kind,
            ImportErrorKind::DeviceUnavailable
                | ImportErrorKind::NotConnected
                | ImportErrorKind::InvalidConfig
        )
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ImportErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ImportErrorKind::NotFound,
            _ => ImportErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(None, err.to_string())
    }
}
