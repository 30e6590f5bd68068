use super::AssetCatalog;
use crate::models::{AssetId, AttachmentMetadata};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct Record {
    file: String,
    metadata: Option<AttachmentMetadata>,
}

/// Catalog backed by a map, for embedding hosts without their own store and
/// for tests.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    records: Arc<Mutex<HashMap<AssetId, Record>>>,
    lookup_count: Arc<Mutex<usize>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(self, id: AssetId, file: &str, metadata: Option<AttachmentMetadata>) -> Self {
        self.insert(id, file, metadata);
        self
    }

    pub fn insert(&self, id: AssetId, file: &str, metadata: Option<AttachmentMetadata>) {
        self.records.lock().unwrap().insert(
            id,
            Record {
                file: file.to_string(),
                metadata,
            },
        );
    }

    pub fn set_metadata(&self, id: AssetId, metadata: AttachmentMetadata) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.metadata = Some(metadata);
        }
    }

    pub fn get_lookup_count(&self) -> usize {
        *self.lookup_count.lock().unwrap()
    }

    fn record(&self, id: AssetId) -> Option<Record> {
        *self.lookup_count.lock().unwrap() += 1;
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl AssetCatalog for InMemoryCatalog {
    async fn attached_file(&self, id: AssetId) -> Result<Option<String>> {
        Ok(self.record(id).map(|r| r.file))
    }

    async fn attachment_metadata(&self, id: AssetId) -> Result<Option<AttachmentMetadata>> {
        Ok(self.record(id).and_then(|r| r.metadata))
    }
}
