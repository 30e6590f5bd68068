use crate::connection::{ConnectionManager, RemoteConnection};
use crate::models::{Asset, AssetState};
use crate::paths::{remote_file_name, remote_parent, PathTranslator};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a remote reclamation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteReclaimReport {
    pub deleted: Vec<String>,
    /// Not present in the remote listing; treated as already deleted.
    pub missing: Vec<String>,
    /// Listed, but the delete command failed.
    pub failed: Vec<String>,
}

/// Mirrors host-side deletions onto the remote store.
///
/// Works without any record of a previous upload: files that were never
/// transferred simply do not show up in the listing.
pub struct RemoteReclaimer {
    connections: Arc<ConnectionManager>,
    paths: PathTranslator,
}

impl RemoteReclaimer {
    pub fn new(connections: Arc<ConnectionManager>, paths: PathTranslator) -> Self {
        Self { connections, paths }
    }

    pub async fn reclaim_asset(&self, asset: &mut Asset) -> Result<RemoteReclaimReport> {
        let original = self.paths.to_remote(&asset.local_original);
        let variants: Vec<String> = asset
            .variants
            .iter()
            .map(|v| self.paths.to_remote(&v.local_path))
            .collect();

        let report = self.reclaim_remote(&original, &variants).await?;
        if asset.state.can_advance_to(AssetState::Removed) {
            asset.state = AssetState::Removed;
        }
        Ok(report)
    }

    /// Delete an original and its variants from the remote store, each one
    /// only if the listing of its directory shows it. Any remote failure
    /// releases the connection once the pass is over.
    pub async fn reclaim_remote(
        &self,
        original: &str,
        variants: &[String],
    ) -> Result<RemoteReclaimReport> {
        let conn = self.connections.acquire().await?;
        let mut report = RemoteReclaimReport::default();

        let mut session_fault = self.reclaim_one(&conn, original, &mut report).await;
        for variant in variants {
            session_fault |= self.reclaim_one(&conn, variant, &mut report).await;
        }
        if session_fault {
            warn!("Dropping connection after remote failure during reclaim of {}", original);
            self.connections.release().await;
        }

        info!(
            "Remote reclaim of {}: {} deleted, {} missing, {} failed",
            original,
            report.deleted.len(),
            report.missing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Returns whether the remote side reported a failure.
    async fn reclaim_one(
        &self,
        conn: &RemoteConnection,
        remote: &str,
        report: &mut RemoteReclaimReport,
    ) -> bool {
        let mut session = conn.lock().await;
        let mut session_fault = false;

        let dir = remote_parent(remote);
        let listed = match session.list_dir(&dir).await {
            Ok(entries) => is_listed(&entries, remote),
            Err(e) => {
                debug!("Listing {} failed, treating {} as absent: {}", dir, remote, e);
                session_fault = e.is_session_fault();
                false
            }
        };

        if !listed {
            debug!("Remote file not found: {}", remote);
            report.missing.push(remote.to_string());
            return session_fault;
        }

        match session.delete_file(remote).await {
            Ok(()) => {
                info!("Remote file deleted: {}", remote);
                report.deleted.push(remote.to_string());
                false
            }
            Err(e) => {
                let fault = e.is_session_fault();
                let err = Error::RemoteDelete {
                    path: remote.to_string(),
                    message: e.to_string(),
                };
                error!("{}", err);
                report.failed.push(remote.to_string());
                fault
            }
        }
    }
}

/// Servers differ on whether NLST returns full paths or bare names.
fn is_listed(entries: &[String], remote: &str) -> bool {
    let name = remote_file_name(remote);
    entries.iter().any(|entry| entry == remote || entry == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSettings;
    use crate::error::ConnectionFailure;
    use crate::models::{AssetId, Variant};
    use crate::remote::MockRemoteStore;
    use pretty_assertions::assert_eq;

    fn reclaimer(store: &MockRemoteStore) -> RemoteReclaimer {
        let manager = ConnectionManager::new(
            Box::new(store.clone()),
            ConnectionSettings {
                endpoint: "ftp.test:21".to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
            },
        );
        RemoteReclaimer::new(
            Arc::new(manager),
            PathTranslator::new("/srv/uploads", "https://example.com/uploads", "https://cdn.test"),
        )
    }

    fn asset() -> Asset {
        Asset::new(
            AssetId(9),
            "/srv/uploads/2024/01/photo.jpg",
            vec![
                Variant::new("thumbnail", "/srv/uploads/2024/01/photo-150x150.jpg"),
                Variant::new("medium", "/srv/uploads/2024/01/photo-300x300.jpg"),
            ],
        )
    }

    #[tokio::test]
    async fn test_reclaim_deletes_listed_files() {
        let store = MockRemoteStore::new()
            .with_file("/2024/01/photo.jpg", b"o".to_vec())
            .with_file("/2024/01/photo-150x150.jpg", b"t".to_vec())
            .with_file("/2024/01/photo-300x300.jpg", b"m".to_vec())
            .with_file("/2024/01/unrelated.jpg", b"u".to_vec());

        let mut asset = asset();
        asset.state = AssetState::AllTransferred;
        let report = reclaimer(&store).reclaim_asset(&mut asset).await.unwrap();

        assert_eq!(report.deleted.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(store.get_files().len(), 1);
        assert!(store.has_file("/2024/01/unrelated.jpg"));
        assert_eq!(asset.state, AssetState::Removed);
    }

    #[tokio::test]
    async fn test_never_uploaded_asset_completes() {
        let store = MockRemoteStore::new();

        let mut asset = asset();
        let report = reclaimer(&store).reclaim_asset(&mut asset).await.unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.missing.len(), 3);
        assert_eq!(asset.state, AssetState::Removed);
    }

    #[tokio::test]
    async fn test_partial_remote_state() {
        let store = MockRemoteStore::new()
            .with_bare_listing()
            .with_file("/2024/01/photo.jpg", b"o".to_vec())
            .with_file("/2024/01/photo-300x300.jpg", b"m".to_vec());

        let report = reclaimer(&store)
            .reclaim_remote(
                "/2024/01/photo.jpg",
                &[
                    "/2024/01/photo-150x150.jpg".to_string(),
                    "/2024/01/photo-300x300.jpg".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            report.deleted,
            vec!["/2024/01/photo.jpg", "/2024/01/photo-300x300.jpg"]
        );
        assert_eq!(report.missing, vec!["/2024/01/photo-150x150.jpg"]);
    }

    #[tokio::test]
    async fn test_failed_delete_is_recorded_and_others_continue() {
        let store = MockRemoteStore::new()
            .with_file("/2024/01/photo.jpg", b"o".to_vec())
            .with_file("/2024/01/photo-150x150.jpg", b"t".to_vec())
            .with_failing_delete("/2024/01/photo.jpg");

        let report = reclaimer(&store)
            .reclaim_remote("/2024/01/photo.jpg", &["/2024/01/photo-150x150.jpg".to_string()])
            .await
            .unwrap();

        assert_eq!(report.failed, vec!["/2024/01/photo.jpg"]);
        assert_eq!(report.deleted, vec!["/2024/01/photo-150x150.jpg"]);
        assert!(store.has_file("/2024/01/photo.jpg"));
    }

    #[tokio::test]
    async fn test_dropped_session_is_replaced_on_next_reclaim() {
        let store = MockRemoteStore::new().with_file("/2024/01/photo.jpg", b"o".to_vec());
        let reclaimer = reclaimer(&store);

        let conn = reclaimer.connections.acquire().await.unwrap();
        conn.lock().await.quit().await.unwrap();

        let first = reclaimer.reclaim_remote("/2024/01/photo.jpg", &[]).await.unwrap();
        assert_eq!(first.missing, vec!["/2024/01/photo.jpg"]);
        assert!(!reclaimer.connections.is_connected().await);

        let second = reclaimer.reclaim_remote("/2024/01/photo.jpg", &[]).await.unwrap();
        assert_eq!(second.deleted, vec!["/2024/01/photo.jpg"]);
        assert_eq!(store.get_open_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_a_connection_error() {
        let store = MockRemoteStore::new().with_unreachable();

        let err = reclaimer(&store)
            .reclaim_remote("/2024/01/photo.jpg", &[])
            .await
            .unwrap_err();

        assert_eq!(err.connection_failure(), Some(ConnectionFailure::Unreachable));
    }

    #[test]
    fn test_is_listed_accepts_full_paths_and_names() {
        let full = vec!["/2024/01/a.jpg".to_string()];
        let bare = vec!["a.jpg".to_string()];

        assert!(is_listed(&full, "/2024/01/a.jpg"));
        assert!(is_listed(&bare, "/2024/01/a.jpg"));
        assert!(!is_listed(&full, "/2024/01/b.jpg"));
    }
}
