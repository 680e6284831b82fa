use std::error::Error as _;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tonic::Code;

/// Coarse classification of a [`TransferError`], for callers that only need
/// to branch on what went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InputNotFound,
    Io,
    Remote,
    Transport,
    InvalidParameters,
    Cancelled,
    Timeout,
}

/// Errors produced while running a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("RPC error: {code:?}/{message}")]
    Remote { code: Code, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl TransferError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InputNotFound(_) => ErrorKind::InputNotFound,
            TransferError::Io { .. } => ErrorKind::Io,
            TransferError::Remote { .. } => ErrorKind::Remote,
            TransferError::Transport(_) => ErrorKind::Transport,
            TransferError::InvalidParameters(_) => ErrorKind::InvalidParameters,
            TransferError::Cancelled => ErrorKind::Cancelled,
            TransferError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

// Statuses that come off the wire never carry a source; ones synthesized by
// tonic from hyper/h2/connect failures do. The code alone says nothing: a
// service may answer `Unavailable` itself.
impl From<tonic::Status> for TransferError {
    fn from(status: tonic::Status) -> Self {
        if status.source().is_some() {
            TransferError::Transport(status.message().to_string())
        } else {
            TransferError::Remote {
                code: status.code(),
                message: status.message().to_string(),
            }
        }
    }
}

impl From<tonic::transport::Error> for TransferError {
    fn from(err: tonic::transport::Error) -> Self {
        match err.source() {
            Some(source) => TransferError::Transport(format!("{}: {}", err, source)),
            None => TransferError::Transport(err.to_string()),
        }
    }
}
