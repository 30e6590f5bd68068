//! Host content-management system lookups
//!
//! The engine does not own asset metadata. It asks the host for an asset's
//! relative storage path and its size metadata when an event needs them.

pub mod memory;

pub use memory::InMemoryCatalog;

use crate::models::{AssetId, AttachmentMetadata};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Storage path of the asset's original, relative to the local base.
    async fn attached_file(&self, id: AssetId) -> Result<Option<String>>;
    async fn attachment_metadata(&self, id: AssetId) -> Result<Option<AttachmentMetadata>>;
}
