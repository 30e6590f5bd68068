//! Remote file-store integration
//!
//! Sessions against an FTP-reachable store. The protocol surface is kept to
//! the handful of commands the engine issues so tests can run against the
//! in-memory store.

pub mod ftp;
pub mod mock;

pub use ftp::{FtpConnector, FtpSession};
pub use mock::MockRemoteStore;

use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// An open, possibly unauthenticated, session with the remote store.
///
/// Paths are absolute remote paths. Implementations report protocol
/// failures as [`crate::Error::Protocol`].
#[async_trait]
pub trait RemoteSession: Send {
    async fn login(&mut self, username: &str, password: &str) -> Result<()>;
    /// Switch data-channel negotiation to passive mode.
    async fn enable_passive(&mut self) -> Result<()>;
    async fn change_dir(&mut self, path: &str) -> Result<()>;
    async fn make_dir(&mut self, path: &str) -> Result<()>;
    /// Binary-mode upload of a local file, replacing any existing remote file.
    async fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<u64>;
    async fn list_dir(&mut self, path: &str) -> Result<Vec<String>>;
    async fn delete_file(&mut self, path: &str) -> Result<()>;
    async fn quit(&mut self) -> Result<()>;
}

/// Opens transport-level sessions to an endpoint.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn RemoteSession>>;
}
