use super::{RemoteConnector, RemoteSession};
use crate::paths::remote_parent;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    files: HashMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    failing_uploads: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_mkdirs: HashSet<String>,
    stale_cwds: HashSet<String>,
    unreachable: bool,
    reject_login: bool,
    bare_listing: bool,
    passive: bool,
    open_count: usize,
    login_count: usize,
    quit_count: usize,
    upload_count: usize,
    mkdir_log: Vec<String>,
}

/// In-memory remote store behaving like a strict FTP server: directories
/// must exist before files are stored into them, and creating an existing
/// directory fails.
#[derive(Clone)]
pub struct MockRemoteStore {
    state: Arc<Mutex<MockState>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_unreachable(self) -> Self {
        self.state.lock().unwrap().unreachable = true;
        self
    }

    pub fn with_rejected_login(self) -> Self {
        self.state.lock().unwrap().reject_login = true;
        self
    }

    /// Listings return bare file names instead of full paths.
    pub fn with_bare_listing(self) -> Self {
        self.state.lock().unwrap().bare_listing = true;
        self
    }

    pub fn with_failing_upload(self, remote_path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(remote_path.to_string());
        self
    }

    pub fn with_failing_delete(self, remote_path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(remote_path.to_string());
        self
    }

    pub fn with_failing_mkdir(self, remote_path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_mkdirs
            .insert(remote_path.to_string());
        self
    }

    /// The first CWD into `remote_path` fails even though the directory
    /// exists, as if another client created it right after the check.
    pub fn with_stale_cwd(self, remote_path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .stale_cwds
            .insert(remote_path.to_string());
        self
    }

    pub fn with_directory(self, remote_path: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut prefix = String::new();
            for segment in remote_path.split('/').filter(|s| !s.is_empty()) {
                prefix.push('/');
                prefix.push_str(segment);
                state.dirs.insert(prefix.clone());
            }
        }
        self
    }

    pub fn with_file(self, remote_path: &str, content: Vec<u8>) -> Self {
        let this = self.with_directory(&remote_parent(remote_path));
        this.state
            .lock()
            .unwrap()
            .files
            .insert(remote_path.to_string(), content);
        this
    }

    pub fn has_file(&self, remote_path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(remote_path)
    }

    pub fn has_directory(&self, remote_path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(remote_path)
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn get_open_count(&self) -> usize {
        self.state.lock().unwrap().open_count
    }

    pub fn get_login_count(&self) -> usize {
        self.state.lock().unwrap().login_count
    }

    pub fn get_quit_count(&self) -> usize {
        self.state.lock().unwrap().quit_count
    }

    pub fn get_upload_count(&self) -> usize {
        self.state.lock().unwrap().upload_count
    }

    /// Every MKD issued, in order, including rejected ones.
    pub fn get_mkdir_log(&self) -> Vec<String> {
        self.state.lock().unwrap().mkdir_log.clone()
    }

    pub fn is_passive(&self) -> bool {
        self.state.lock().unwrap().passive
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteConnector for MockRemoteStore {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn RemoteSession>> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(Error::Protocol(format!("connect {}: refused", endpoint)));
        }
        state.open_count += 1;

        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Protocol("session is closed".to_string()))
        }
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn login(&mut self, _username: &str, _password: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().unwrap();
        state.login_count += 1;
        if state.reject_login {
            return Err(Error::Protocol("530 Login incorrect".to_string()));
        }
        Ok(())
    }

    async fn enable_passive(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().unwrap().passive = true;
        Ok(())
    }

    async fn change_dir(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().unwrap();
        if state.stale_cwds.remove(path) {
            return Err(Error::Protocol(format!("550 {}: No such directory", path)));
        }
        if state.dirs.contains(path) {
            Ok(())
        } else {
            Err(Error::Protocol(format!("550 {}: No such directory", path)))
        }
    }

    async fn make_dir(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().unwrap();
        state.mkdir_log.push(path.to_string());

        if state.failing_mkdirs.contains(path) {
            return Err(Error::Protocol(format!("550 {}: Permission denied", path)));
        }
        if !state.dirs.contains(&remote_parent(path)) {
            return Err(Error::Protocol(format!("550 {}: No such directory", path)));
        }
        if !state.dirs.insert(path.to_string()) {
            return Err(Error::Protocol(format!("550 {}: File exists", path)));
        }
        Ok(())
    }

    async fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<u64> {
        self.ensure_open()?;
        let data = tokio::fs::read(local_path).await?;

        let mut state = self.state.lock().unwrap();
        if state.failing_uploads.contains(remote_path) {
            return Err(Error::Protocol(format!("451 {}: Transfer aborted", remote_path)));
        }
        if !state.dirs.contains(&remote_parent(remote_path)) {
            return Err(Error::Protocol(format!("553 {}: No such directory", remote_path)));
        }
        state.upload_count += 1;
        let len = data.len() as u64;
        state.files.insert(remote_path.to_string(), data);
        Ok(len)
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let state = self.state.lock().unwrap();
        if !state.dirs.contains(path) {
            return Err(Error::Protocol(format!("550 {}: No such directory", path)));
        }

        let mut entries: Vec<String> = state
            .files
            .keys()
            .filter(|key| remote_parent(key) == path)
            .map(|key| {
                if state.bare_listing {
                    crate::paths::remote_file_name(key).to_string()
                } else {
                    key.clone()
                }
            })
            .collect();
        entries.sort();
        Ok(entries)
    }

    async fn delete_file(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(path) {
            return Err(Error::Protocol(format!("550 {}: Permission denied", path)));
        }
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::Protocol(format!("550 {}: No such file", path))),
        }
    }

    async fn quit(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().quit_count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_mock_store_rejects_upload_into_missing_directory() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("a.jpg");
        fs::write(&local, b"jpeg").unwrap();

        let store = MockRemoteStore::new();
        let mut session = store.open("mock:21").await.unwrap();

        assert!(session.put_file(&local, "/2024/a.jpg").await.is_err());

        session.make_dir("/2024").await.unwrap();
        assert_eq!(session.put_file(&local, "/2024/a.jpg").await.unwrap(), 4);
        assert!(store.has_file("/2024/a.jpg"));
    }

    #[tokio::test]
    async fn test_mock_store_mkdir_existing_fails() {
        let store = MockRemoteStore::new().with_directory("/2024/01");
        let mut session = store.open("mock:21").await.unwrap();

        assert!(session.make_dir("/2024").await.is_err());
        assert!(session.change_dir("/2024/01").await.is_ok());
        assert_eq!(store.get_mkdir_log(), vec!["/2024".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_store_listing_modes() {
        let store = MockRemoteStore::new().with_file("/2024/a.jpg", b"x".to_vec());
        let mut session = store.open("mock:21").await.unwrap();
        assert_eq!(session.list_dir("/2024").await.unwrap(), vec!["/2024/a.jpg"]);

        let bare = MockRemoteStore::new()
            .with_bare_listing()
            .with_file("/2024/a.jpg", b"x".to_vec());
        let mut session = bare.open("mock:21").await.unwrap();
        assert_eq!(session.list_dir("/2024").await.unwrap(), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_mock_store_closed_session() {
        let store = MockRemoteStore::new();
        let mut session = store.open("mock:21").await.unwrap();

        session.quit().await.unwrap();
        session.quit().await.unwrap();

        assert_eq!(store.get_quit_count(), 1);
        assert!(session.change_dir("/").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_store_unreachable() {
        let store = MockRemoteStore::new().with_unreachable();
        assert!(store.open("mock:21").await.is_err());
        assert_eq!(store.get_open_count(), 0);
    }
}
