//! Error handling and custom error types
//!
//! Provides unified error handling across the sync engine using thiserror.
//! Most of these are downgraded to logged outcomes by the component that
//! hits them; only configuration and host lookups propagate.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a connection to the remote store could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    Unreachable,
    AuthRejected,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailure::Unreachable => write!(f, "unreachable"),
            ConnectionFailure::AuthRejected => write!(f, "auth_rejected"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection to {endpoint} failed: {reason}")]
    Connection {
        endpoint: String,
        reason: ConnectionFailure,
    },

    #[error("Remote protocol error: {0}")]
    Protocol(String),

    #[error("Failed to provision remote directory {path}: {message}")]
    Provision { path: String, message: String },

    #[error("Failed to transfer {} to {remote}: {source}", local.display())]
    Transfer {
        local: PathBuf,
        remote: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to delete local file {}: {source}", path.display())]
    Reclaim {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete remote file {path}: {message}")]
    RemoteDelete { path: String, message: String },

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// The connection failure reason, if this is a connection error.
    pub fn connection_failure(&self) -> Option<ConnectionFailure> {
        match self {
            Error::Connection { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the failure came from the remote session rather than from
    /// local files. A faulted session should be released and reopened.
    pub fn is_session_fault(&self) -> bool {
        match self {
            Error::Protocol(_) => true,
            Error::Transfer { source, .. } => source.is_session_fault(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
