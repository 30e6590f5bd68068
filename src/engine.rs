//! Event surface the host wires its upload and attachment lifecycle into.

use crate::connection::{ConnectionManager, ConnectionSettings};
use crate::host::AssetCatalog;
use crate::models::{
    Asset, AssetId, AttachmentMetadata, Config, Srcset, TransferOutcome, UploadDirs, UploadedFile,
};
use crate::paths::PathTranslator;
use crate::reclaim::{LocalReclaimer, ReclaimReport, RemoteReclaimReport, RemoteReclaimer};
use crate::remote::{FtpConnector, RemoteConnector};
use crate::rewrite::UrlRewriter;
use crate::upload::UploadOrchestrator;
use crate::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Owns one worker's connection and the components sharing it.
pub struct SyncEngine {
    connections: Arc<ConnectionManager>,
    paths: PathTranslator,
    uploader: UploadOrchestrator,
    local_reclaimer: LocalReclaimer,
    remote_reclaimer: RemoteReclaimer,
    rewriter: UrlRewriter,
    catalog: Box<dyn AssetCatalog>,
}

/// Injectable service bundle used to construct [`SyncEngine`].
pub struct EngineServices {
    pub connector: Box<dyn RemoteConnector>,
    pub catalog: Box<dyn AssetCatalog>,
}

/// Result of syncing an asset once its sizes exist.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub outcome: TransferOutcome,
    pub reclaim: ReclaimReport,
}

impl SyncEngine {
    pub fn with_services(services: EngineServices, config: &Config) -> Self {
        let connections = Arc::new(ConnectionManager::new(
            services.connector,
            ConnectionSettings {
                endpoint: config.endpoint.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
        ));
        let paths = PathTranslator::new(
            config.local_base.clone(),
            config.local_base_url.clone(),
            config.remote_base_url.clone(),
        );

        Self {
            uploader: UploadOrchestrator::new(Arc::clone(&connections), paths.clone()),
            local_reclaimer: LocalReclaimer::new(),
            remote_reclaimer: RemoteReclaimer::new(Arc::clone(&connections), paths.clone()),
            rewriter: UrlRewriter::new(paths.clone()),
            connections,
            paths,
            catalog: services.catalog,
        }
    }

    /// Construct an engine from environment configuration (`Config::from_env`)
    /// talking FTP to the configured endpoint.
    pub fn new(catalog: Box<dyn AssetCatalog>) -> Result<Self> {
        let config = Config::from_env()?;
        info!(
            "Syncing {} to {} ({})",
            config.local_base.display(),
            config.endpoint,
            config.remote_base_url
        );

        Ok(Self::with_services(
            EngineServices {
                connector: Box::new(FtpConnector::new(config.timeout)),
                catalog,
            },
            &config,
        ))
    }

    /// The host finished storing a new upload: mirror the original and hand
    /// back the upload with its public URL pointing at the remote store.
    pub async fn on_upload_complete(&self, mut upload: UploadedFile) -> UploadedFile {
        upload.url = self.paths.upload_url(&upload.file, &upload.url);

        match self.uploader.upload_original(&upload.file).await {
            Ok(remote) => info!("Uploaded original {} to {}", upload.file.display(), remote),
            Err(e) => error!("Original {} not uploaded: {}", upload.file.display(), e),
        }
        upload
    }

    /// The host generated size variants: upload the asset, then drop the
    /// local copies if everything made it.
    pub async fn on_sizes_generated(
        &self,
        id: AssetId,
        metadata: AttachmentMetadata,
    ) -> AttachmentMetadata {
        self.sync_asset(id, &metadata).await;
        metadata
    }

    pub async fn sync_asset(&self, id: AssetId, metadata: &AttachmentMetadata) -> Option<SyncReport> {
        let file = self.attached_file(id).await?;
        let mut asset = Asset::from_metadata(id, self.paths.local_base(), &file, metadata);

        let outcome = self.uploader.upload_asset(&mut asset).await;
        let reclaim = self.local_reclaimer.reclaim(&mut asset, &outcome).await;

        Some(SyncReport { outcome, reclaim })
    }

    /// The host deleted an asset: remove its files from the remote store.
    pub async fn on_asset_deleted(&self, id: AssetId) -> RemoteReclaimReport {
        let Some(file) = self.attached_file(id).await else {
            return RemoteReclaimReport::default();
        };

        let metadata = match self.catalog.attachment_metadata(id).await {
            Ok(metadata) => metadata.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read metadata for asset {}: {}", id, e);
                AttachmentMetadata::default()
            }
        };

        let mut asset = Asset::from_metadata(id, self.paths.local_base(), &file, &metadata);
        match self.remote_reclaimer.reclaim_asset(&mut asset).await {
            Ok(report) => report,
            Err(e) => {
                error!("Remote files of asset {} not deleted: {}", id, e);
                RemoteReclaimReport::default()
            }
        }
    }

    pub fn on_attachment_url_requested(&self, url: &str) -> String {
        self.rewriter.rewrite_url(url)
    }

    pub fn on_srcset_requested(&self, mut sources: Srcset) -> Srcset {
        self.rewriter.rewrite_srcset(&mut sources);
        sources
    }

    pub fn on_upload_dir_requested(&self, mut dirs: UploadDirs) -> UploadDirs {
        self.rewriter.rewrite_upload_dirs(&mut dirs);
        dirs
    }

    /// Close the remote connection. Call once at process teardown.
    pub async fn shutdown(&self) {
        self.connections.release().await;
    }

    async fn attached_file(&self, id: AssetId) -> Option<String> {
        match self.catalog.attached_file(id).await {
            Ok(Some(file)) => Some(file),
            Ok(None) => {
                warn!("No file metadata found for asset {}", id);
                None
            }
            Err(e) => {
                error!("Lookup of asset {} failed: {}", id, e);
                None
            }
        }
    }
}
