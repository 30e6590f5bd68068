//! Lifecycle of the single connection to the remote store.
//!
//! A [`ConnectionManager`] is an explicit value owned by one worker. It opens
//! and authenticates lazily, hands out the same [`RemoteConnection`] until
//! released, and never reconnects on its own. Callers that hit a remote
//! failure `release` it so the next `acquire` opens a fresh session.

use crate::error::ConnectionFailure;
use crate::remote::{RemoteConnector, RemoteSession};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Shared handle to an authenticated session.
#[derive(Clone)]
pub struct RemoteConnection {
    session: Arc<Mutex<Box<dyn RemoteSession>>>,
}

impl RemoteConnection {
    fn new(session: Box<dyn RemoteSession>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Exclusive access to the session for a sequence of commands.
    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn RemoteSession>> {
        self.session.lock().await
    }

    /// Whether both handles refer to the same underlying session.
    pub fn same_as(&self, other: &RemoteConnection) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }
}

/// Credentials and endpoint for the remote store.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

pub struct ConnectionManager {
    connector: Box<dyn RemoteConnector>,
    settings: ConnectionSettings,
    live: Mutex<Option<RemoteConnection>>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn RemoteConnector>, settings: ConnectionSettings) -> Self {
        Self {
            connector,
            settings,
            live: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    /// Return the live connection, opening and authenticating one first if
    /// there is none.
    pub async fn acquire(&self) -> Result<RemoteConnection> {
        let mut live = self.live.lock().await;
        if let Some(conn) = live.as_ref() {
            debug!("Reusing open connection to {}", self.settings.endpoint);
            return Ok(conn.clone());
        }

        let mut session = self.connector.open(&self.settings.endpoint).await.map_err(|e| {
            error!("Cannot connect to {}: {}", self.settings.endpoint, e);
            self.failure(ConnectionFailure::Unreachable)
        })?;
        info!("Connected to {}", self.settings.endpoint);

        if let Err(e) = session
            .login(&self.settings.username, &self.settings.password)
            .await
        {
            error!("Login to {} failed: {}", self.settings.endpoint, e);
            if let Err(e) = session.quit().await {
                warn!("Failed to close rejected session: {}", e);
            }
            return Err(self.failure(ConnectionFailure::AuthRejected));
        }

        if let Err(e) = session.enable_passive().await {
            error!("Failed to enable passive mode: {}", e);
            if let Err(e) = session.quit().await {
                warn!("Failed to close session: {}", e);
            }
            return Err(self.failure(ConnectionFailure::Unreachable));
        }

        let conn = RemoteConnection::new(session);
        *live = Some(conn.clone());
        Ok(conn)
    }

    /// Close the live connection, if any.
    pub async fn release(&self) {
        let Some(conn) = self.live.lock().await.take() else {
            return;
        };

        let result = conn.lock().await.quit().await;
        match result {
            Ok(()) => info!("Connection to {} closed", self.settings.endpoint),
            Err(e) => warn!("Error closing connection to {}: {}", self.settings.endpoint, e),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.live.lock().await.is_some()
    }

    fn failure(&self, reason: ConnectionFailure) -> Error {
        Error::Connection {
            endpoint: self.settings.endpoint.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteStore;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            endpoint: "ftp.test:21".to_string(),
            username: "user".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_acquire_twice_returns_same_handle() {
        let store = MockRemoteStore::new();
        let manager = ConnectionManager::new(Box::new(store.clone()), settings());

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(first.same_as(&second));
        assert_eq!(store.get_open_count(), 1);
        assert_eq!(store.get_login_count(), 1);
        assert!(store.is_passive());
    }

    #[tokio::test]
    async fn test_acquire_unreachable() {
        let store = MockRemoteStore::new().with_unreachable();
        let manager = ConnectionManager::new(Box::new(store), settings());

        let err = manager.acquire().await.err().unwrap();
        assert_eq!(err.connection_failure(), Some(ConnectionFailure::Unreachable));
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_acquire_auth_rejected_closes_transport() {
        let store = MockRemoteStore::new().with_rejected_login();
        let manager = ConnectionManager::new(Box::new(store.clone()), settings());

        let err = manager.acquire().await.err().unwrap();
        assert_eq!(err.connection_failure(), Some(ConnectionFailure::AuthRejected));
        assert_eq!(store.get_quit_count(), 1);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_allows_reacquire() {
        let store = MockRemoteStore::new();
        let manager = ConnectionManager::new(Box::new(store.clone()), settings());

        let first = manager.acquire().await.unwrap();
        manager.release().await;
        manager.release().await;
        assert_eq!(store.get_quit_count(), 1);

        let second = manager.acquire().await.unwrap();
        assert!(!first.same_as(&second));
        assert_eq!(store.get_login_count(), 2);
    }

    #[tokio::test]
    async fn test_release_after_server_dropped_session() {
        let store = MockRemoteStore::new();
        let manager = ConnectionManager::new(Box::new(store.clone()), settings());

        let dead = manager.acquire().await.unwrap();
        dead.lock().await.quit().await.unwrap();
        assert!(dead.lock().await.change_dir("/").await.is_err());

        manager.release().await;
        let fresh = manager.acquire().await.unwrap();
        assert!(!fresh.same_as(&dead));
        assert!(fresh.lock().await.change_dir("/").await.is_ok());
        assert_eq!(store.get_open_count(), 2);
    }
}
