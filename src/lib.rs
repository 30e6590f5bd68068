//! Keeps a local media-asset tree mirrored onto an FTP-reachable file store
//!
//! Assets (an original plus its size variants) are uploaded as a unit, local
//! copies are dropped only once every file made it, deletions are mirrored
//! remotely, and public URLs are rewritten to point at the remote store.

pub mod connection;
pub mod engine;
pub mod error;
pub mod host;
pub mod models;
pub mod paths;
pub mod provision;
pub mod reclaim;
pub mod remote;
pub mod rewrite;
pub mod telemetry;
pub mod upload;

pub use error::{Error, Result};
