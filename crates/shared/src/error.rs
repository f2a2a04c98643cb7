use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    /// The inference service could not be reached or did not answer in time.
    Transport,
    /// The service answered with a failure.
    Service,
    /// The service answered with a body that is not a scan result.
    Decode,
    /// The selected file could not be read before upload.
    Unreadable,
}

impl ScanErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Service => "service",
            Self::Decode => "decode",
            Self::Unreadable => "unreadable",
        }
    }
}

/// Failure outcome of one upload attempt, ready to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub message: String,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ScanErrorKind::Transport
    }
}
