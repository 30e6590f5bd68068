//! Remote directory provisioning.

use crate::connection::RemoteConnection;
use crate::{Error, Result};
use tracing::{debug, info};

/// Makes sure every segment of a remote directory path exists.
///
/// Existence is probed by changing into each prefix; any probe failure is
/// taken to mean "absent", so a create may be attempted for a directory
/// that is merely unreadable. The working directory is left wherever the
/// last probe put it, so later commands must use absolute paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryProvisioner;

impl DirectoryProvisioner {
    pub fn new() -> Self {
        Self
    }

    pub async fn ensure(&self, conn: &RemoteConnection, remote_dir: &str) -> Result<()> {
        let mut session = conn.lock().await;
        let mut path = String::new();

        for segment in remote_dir.split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(segment);

            if session.change_dir(&path).await.is_ok() {
                continue;
            }

            match session.make_dir(&path).await {
                Ok(()) => info!("Created remote directory {}", path),
                Err(e) => {
                    // A concurrent worker may have created it between probe
                    // and create.
                    if session.change_dir(&path).await.is_ok() {
                        debug!("Remote directory {} appeared concurrently", path);
                        continue;
                    }
                    return Err(Error::Provision {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionManager, ConnectionSettings};
    use crate::remote::MockRemoteStore;

    async fn connect(store: &MockRemoteStore) -> RemoteConnection {
        let manager = ConnectionManager::new(
            Box::new(store.clone()),
            ConnectionSettings {
                endpoint: "ftp.test:21".to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
            },
        );
        manager.acquire().await.unwrap()
    }

    #[tokio::test]
    async fn test_ensure_creates_each_segment() {
        let store = MockRemoteStore::new();
        let conn = connect(&store).await;

        DirectoryProvisioner::new()
            .ensure(&conn, "/2024/01")
            .await
            .unwrap();

        assert!(store.has_directory("/2024"));
        assert!(store.has_directory("/2024/01"));
        assert_eq!(store.get_mkdir_log(), vec!["/2024", "/2024/01"]);
    }

    #[tokio::test]
    async fn test_ensure_twice_issues_no_duplicate_create() {
        let store = MockRemoteStore::new();
        let conn = connect(&store).await;
        let provisioner = DirectoryProvisioner::new();

        provisioner.ensure(&conn, "/2024/01").await.unwrap();
        provisioner.ensure(&conn, "/2024/01").await.unwrap();
        provisioner.ensure(&conn, "/2024/02").await.unwrap();

        assert_eq!(store.get_mkdir_log(), vec!["/2024", "/2024/01", "/2024/02"]);
    }

    #[tokio::test]
    async fn test_ensure_root_is_noop() {
        let store = MockRemoteStore::new();
        let conn = connect(&store).await;

        DirectoryProvisioner::new().ensure(&conn, "/").await.unwrap();
        assert!(store.get_mkdir_log().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_reports_failed_create() {
        let store = MockRemoteStore::new().with_failing_mkdir("/2024/01");
        let conn = connect(&store).await;

        let err = DirectoryProvisioner::new()
            .ensure(&conn, "/2024/01")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provision { ref path, .. } if path == "/2024/01"));
        assert!(store.has_directory("/2024"));
    }

    #[tokio::test]
    async fn test_ensure_tolerates_directory_created_concurrently() {
        let store = MockRemoteStore::new()
            .with_directory("/2024/01")
            .with_stale_cwd("/2024");
        let conn = connect(&store).await;

        DirectoryProvisioner::new()
            .ensure(&conn, "/2024/01")
            .await
            .unwrap();

        // The create lost the race and was rejected; nothing else was tried
        assert_eq!(store.get_mkdir_log(), vec!["/2024".to_string()]);
        assert!(store.has_directory("/2024/01"));
    }
}
