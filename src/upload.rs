//! Per-asset upload of an original and its size variants.

use crate::connection::{ConnectionManager, RemoteConnection};
use crate::models::{Asset, AssetState, TransferOutcome, TransferStatus};
use crate::paths::{remote_parent, PathTranslator};
use crate::provision::DirectoryProvisioner;
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct UploadOrchestrator {
    connections: Arc<ConnectionManager>,
    paths: PathTranslator,
    provisioner: DirectoryProvisioner,
}

impl UploadOrchestrator {
    pub fn new(connections: Arc<ConnectionManager>, paths: PathTranslator) -> Self {
        Self {
            connections,
            paths,
            provisioner: DirectoryProvisioner::new(),
        }
    }

    /// Provision the remote directory and upload a single original file.
    ///
    /// Used when the host reports a finished upload, before any variants
    /// exist. Returns the remote path on success.
    pub async fn upload_original(&self, local_original: &Path) -> Result<String> {
        let conn = self.connections.acquire().await?;
        let remote = self.prepare(&conn, local_original).await;
        if let Err(e) = self.transfer(&conn, local_original, &remote).await {
            if e.is_session_fault() {
                self.connections.release().await;
            }
            return Err(e);
        }
        Ok(remote)
    }

    /// Upload the original and every variant of an asset.
    ///
    /// A failing variant does not stop the others; the outcome only reports
    /// success when every file made it. If the remote side failed anywhere in
    /// the pass, the connection is released afterwards so the next upload
    /// starts on a fresh session.
    pub async fn upload_asset(&self, asset: &mut Asset) -> TransferOutcome {
        if let Err(e) = asset.set_state(AssetState::Uploading) {
            error!("Asset {} cannot be uploaded: {}", asset.id, e);
            return TransferOutcome::failed_entirely();
        }

        let conn = match self.connections.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Asset {} not uploaded: {}", asset.id, e);
                asset.original_status = TransferStatus::Failed;
                for variant in asset.variants.iter_mut() {
                    variant.status = TransferStatus::Failed;
                }
                let failed = asset
                    .local_files()
                    .map(|path| self.paths.to_remote(path))
                    .collect();
                return self.finish(asset, failed);
            }
        };

        let mut failed = Vec::new();
        let mut session_fault = false;

        let remote = self.prepare(&conn, &asset.local_original).await;
        asset.original_status = match self.transfer(&conn, &asset.local_original, &remote).await {
            Ok(()) => TransferStatus::Transferred,
            Err(e) => {
                error!("{}", e);
                session_fault |= e.is_session_fault();
                failed.push(remote);
                TransferStatus::Failed
            }
        };

        for variant in asset.variants.iter_mut() {
            let remote = self.paths.to_remote(&variant.local_path);
            variant.status = match self.transfer(&conn, &variant.local_path, &remote).await {
                Ok(()) => TransferStatus::Transferred,
                Err(e) => {
                    error!("Variant '{}' of asset {}: {}", variant.name, asset.id, e);
                    session_fault |= e.is_session_fault();
                    failed.push(remote);
                    TransferStatus::Failed
                }
            };
        }

        if session_fault {
            warn!("Asset {}: dropping connection after remote failure", asset.id);
            self.connections.release().await;
        }
        self.finish(asset, failed)
    }

    /// Provision the original's remote directory and return its remote path.
    /// Provisioning failures are logged only; the transfer that follows will
    /// report the real error.
    async fn prepare(&self, conn: &RemoteConnection, local_original: &Path) -> String {
        let remote = self.paths.to_remote(local_original);
        let remote_dir = remote_parent(&remote);
        if let Err(e) = self.provisioner.ensure(conn, &remote_dir).await {
            warn!("{}", e);
        }
        remote
    }

    async fn transfer(&self, conn: &RemoteConnection, local: &Path, remote: &str) -> Result<()> {
        let mut session = conn.lock().await;
        match session.put_file(local, remote).await {
            Ok(bytes) => {
                info!("Transferred {} ({} bytes) to {}", local.display(), bytes, remote);
                Ok(())
            }
            Err(e) => Err(Error::Transfer {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                source: Box::new(e),
            }),
        }
    }

    fn finish(&self, asset: &mut Asset, failed: Vec<String>) -> TransferOutcome {
        let outcome = TransferOutcome::from_asset(asset, failed);
        let next = if outcome.all_transferred {
            AssetState::AllTransferred
        } else {
            AssetState::PartiallyFailed
        };
        if let Err(e) = asset.set_state(next) {
            error!("Asset {}: {}", asset.id, e);
        }

        if outcome.all_transferred {
            info!(
                "Asset {}: all {} files transferred",
                asset.id,
                asset.variants.len() + 1
            );
        } else {
            warn!(
                "Asset {}: not all files were transferred ({} failed)",
                asset.id,
                outcome.failed.len()
            );
        }
        outcome
    }
}
