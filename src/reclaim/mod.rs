//! Reclaiming files once they are no longer needed on one side.
//!
//! Local copies are reclaimed after a fully successful upload; remote copies
//! are reclaimed when the host deletes the asset.

pub mod local;
pub mod remote;

pub use local::{LocalReclaimer, ReclaimReport};
pub use remote::{RemoteReclaimReport, RemoteReclaimer};
