use serde::{Deserialize, Serialize};

/// Client-wide failure taxonomy. Every typed component error maps onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Device,
    Network,
    Server,
    State,
    Storage,
}

impl ErrorKind {
    /// State errors are no-ops; they never reach the transcript or the user.
    pub fn is_silent(self) -> bool {
        matches!(self, Self::State)
    }
}

/// Error body returned by the backend on non-2xx responses: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
