use crate::models::{Asset, AssetState, TransferOutcome};
use crate::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a local reclamation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Nothing was touched because the upload was incomplete.
    pub skipped: bool,
    pub deleted: Vec<PathBuf>,
    /// Files that were already gone.
    pub absent: Vec<PathBuf>,
    /// Files that could not be deleted and are still on disk.
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalReclaimer;

impl LocalReclaimer {
    pub fn new() -> Self {
        Self
    }

    /// Delete the local original and every variant, but only when the
    /// outcome says all of them reached the remote store.
    pub async fn reclaim(&self, asset: &mut Asset, outcome: &TransferOutcome) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        if !outcome.all_transferred {
            info!(
                "Not all files were transferred. Skipping local deletion for asset {}",
                asset.id
            );
            report.skipped = true;
            return report;
        }

        for path in asset.local_files() {
            self.remove(path, &mut report).await;
        }

        if report.failed.is_empty() && asset.state.can_advance_to(AssetState::LocallyReclaimed) {
            asset.state = AssetState::LocallyReclaimed;
        }
        report
    }

    async fn remove(&self, path: &Path, report: &mut ReclaimReport) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!("Local file deleted: {}", path.display());
                report.deleted.push(path.to_path_buf());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Local file already absent: {}", path.display());
                report.absent.push(path.to_path_buf());
            }
            Err(source) => {
                let err = Error::Reclaim {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                report.failed.push(path.to_path_buf());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetId, Variant};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn outcome(all_transferred: bool) -> TransferOutcome {
        TransferOutcome {
            all_transferred,
            failed: Vec::new(),
        }
    }

    fn asset_in(dir: &Path) -> Asset {
        let original = dir.join("photo.jpg");
        let thumb = dir.join("photo-150x150.jpg");
        fs::write(&original, b"original").unwrap();
        fs::write(&thumb, b"thumb").unwrap();
        let mut asset = Asset::new(AssetId(3), original, vec![Variant::new("thumbnail", thumb)]);
        asset.state = AssetState::AllTransferred;
        asset
    }

    #[tokio::test]
    async fn test_incomplete_upload_deletes_nothing() {
        let dir = tempdir().unwrap();
        let mut asset = asset_in(dir.path());
        asset.state = AssetState::PartiallyFailed;

        let report = LocalReclaimer::new().reclaim(&mut asset, &outcome(false)).await;

        assert!(report.skipped);
        assert!(asset.local_original.exists());
        assert!(asset.variants[0].local_path.exists());
        assert_eq!(asset.state, AssetState::PartiallyFailed);
    }

    #[tokio::test]
    async fn test_complete_upload_deletes_all_files() {
        let dir = tempdir().unwrap();
        let mut asset = asset_in(dir.path());

        let report = LocalReclaimer::new().reclaim(&mut asset, &outcome(true)).await;

        assert_eq!(report.deleted.len(), 2);
        assert!(!asset.local_original.exists());
        assert!(!asset.variants[0].local_path.exists());
        assert_eq!(asset.state, AssetState::LocallyReclaimed);
    }

    #[tokio::test]
    async fn test_already_absent_files_are_not_errors() {
        let dir = tempdir().unwrap();
        let mut asset = asset_in(dir.path());
        fs::remove_file(&asset.variants[0].local_path).unwrap();

        let report = LocalReclaimer::new().reclaim(&mut asset, &outcome(true)).await;

        assert_eq!(report.deleted, vec![asset.local_original.clone()]);
        assert_eq!(report.absent, vec![asset.variants[0].local_path.clone()]);
        assert!(report.failed.is_empty());

        // A second pass finds nothing left and still succeeds
        let report = LocalReclaimer::new().reclaim(&mut asset, &outcome(true)).await;
        assert!(report.deleted.is_empty());
        assert_eq!(report.absent.len(), 2);
    }

    #[tokio::test]
    async fn test_undeletable_path_is_recorded() {
        let dir = tempdir().unwrap();
        let mut asset = asset_in(dir.path());
        // A directory in place of a variant cannot be removed with remove_file
        let blocker = dir.path().join("photo-300x300.jpg");
        fs::create_dir(&blocker).unwrap();
        asset.variants.push(Variant::new("medium", blocker.clone()));

        let report = LocalReclaimer::new().reclaim(&mut asset, &outcome(true)).await;

        assert_eq!(report.failed, vec![blocker.clone()]);
        assert!(blocker.exists());
        assert_eq!(asset.state, AssetState::AllTransferred);
    }
}
