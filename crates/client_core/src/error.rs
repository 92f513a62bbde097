//! Typed failures for every client component, each mapped onto [`ErrorKind`].

use shared::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {message}")]
    Network {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Server {
        endpoint: &'static str,
        status: u16,
        message: String,
    },
    #[error("invalid response body from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

impl BackendError {
    pub fn network(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Server { .. } | Self::Decode { .. } => ErrorKind::Server,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapErrorKind {
    Network,
    Validation,
    Server,
    Storage,
}

impl From<BootstrapErrorKind> for ErrorKind {
    fn from(value: BootstrapErrorKind) -> Self {
        match value {
            BootstrapErrorKind::Network => ErrorKind::Network,
            BootstrapErrorKind::Validation => ErrorKind::Validation,
            BootstrapErrorKind::Server => ErrorKind::Server,
            BootstrapErrorKind::Storage => ErrorKind::Storage,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("session bootstrap failed ({kind:?}): {message}")]
pub struct BootstrapError {
    pub kind: BootstrapErrorKind,
    pub message: String,
}

impl BootstrapError {
    pub fn new(kind: BootstrapErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(BootstrapErrorKind::Validation, message)
    }
}

impl From<BackendError> for BootstrapError {
    fn from(value: BackendError) -> Self {
        let kind = match value.kind() {
            ErrorKind::Network => BootstrapErrorKind::Network,
            _ => BootstrapErrorKind::Server,
        };
        Self::new(kind, value.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
}

/// Operation attempted in the wrong state. Always a no-op for the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} is not valid while {state}")]
pub struct StateError {
    pub operation: &'static str,
    pub state: String,
}

impl StateError {
    pub fn new(operation: &'static str, state: impl std::fmt::Display) -> Self {
        Self {
            operation,
            state: state.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("audio upload failed: {0}")]
    Upload(#[from] BackendError),
}

impl TranscriptionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::State(_) => ErrorKind::State,
            Self::Device(_) => ErrorKind::Device,
            Self::Upload(err) => err.kind(),
        }
    }
}
