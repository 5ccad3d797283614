//! Error types for ocigen

use std::path::PathBuf;

use thiserror::Error;

use crate::security::seccomp::SeccompError;

/// Every failure a [`Generator`](crate::Generator) operation can report.
///
/// Validation errors are raised before any mutation, so a failed call
/// leaves the document exactly as it was.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Template file does not exist
    #[error("template configuration at {} not found", path.display())]
    NotFound { path: PathBuf },

    /// Template stream is not a valid configuration document
    #[error("failed to decode configuration: {0}")]
    Decode(#[source] serde_json::Error),

    /// Unknown capability, namespace kind, cgroup mount mode or propagation mode
    #[error("invalid value: {0}")]
    Validation(String),

    /// Capability is known but above the host's last supported index
    #[error("{0} is not supported on the current host")]
    HostUnsupportedCapability(String),

    #[error("failed to encode configuration: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("seccomp: {0}")]
    Seccomp(#[from] SeccompError),
}

impl GeneratorError {
    /// Split a serde_json failure into its I/O and encoding halves.
    pub(crate) fn from_encode(e: serde_json::Error) -> Self {
        if e.is_io() {
            GeneratorError::Io(e.into())
        } else {
            GeneratorError::Serialization(e)
        }
    }

    pub(crate) fn from_decode(e: serde_json::Error) -> Self {
        if e.is_io() {
            GeneratorError::Io(e.into())
        } else {
            GeneratorError::Decode(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
