use super::{RemoteConnector, RemoteSession};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};

/// Opens plain FTP control connections. The timeout bounds the TCP connect
/// and every later read or write on the control socket, greeting included.
pub struct FtpConnector {
    timeout: Duration,
}

impl FtpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RemoteConnector for FtpConnector {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn RemoteSession>> {
        let endpoint = endpoint.to_string();
        let timeout = self.timeout;

        let stream = tokio::task::spawn_blocking(move || -> Result<FtpStream> {
            let addr = endpoint
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| Error::Protocol(format!("No address for {}", endpoint)))?;
            let socket = TcpStream::connect_timeout(&addr, timeout)
                .map_err(|e| Error::Protocol(format!("connect {}: {}", endpoint, e)))?;
            socket.set_read_timeout(Some(timeout))?;
            socket.set_write_timeout(Some(timeout))?;
            FtpStream::connect_with_stream(socket)
                .map_err(|e| Error::Protocol(format!("greeting from {}: {}", endpoint, e)))
        })
        .await
        .map_err(|e| Error::Invariant(format!("FTP connect task join error: {}", e)))??;

        Ok(Box::new(FtpSession {
            stream: Some(stream),
        }))
    }
}

/// A blocking FTP control connection driven from the tokio blocking pool.
pub struct FtpSession {
    stream: Option<FtpStream>,
}

impl FtpSession {
    /// Run one protocol call on the blocking pool, handing the stream back
    /// afterwards. A panicking call leaves the session closed.
    async fn call<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| Error::Protocol("FTP session is closed".to_string()))?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| Error::Invariant(format!("FTP task join error: {}", e)))?;

        self.stream = Some(stream);
        result
    }
}

fn protocol(op: &str, path: &str, e: suppaftp::FtpError) -> Error {
    Error::Protocol(format!("{} {}: {}", op, path, e))
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let username = username.to_string();
        let password = password.to_string();
        self.call(move |ftp| {
            ftp.login(username.as_str(), password.as_str())
                .map_err(|e| protocol("USER", &username, e))
        })
        .await
    }

    async fn enable_passive(&mut self) -> Result<()> {
        match self.stream.as_mut() {
            Some(ftp) => {
                ftp.set_mode(Mode::Passive);
                Ok(())
            }
            None => Err(Error::Protocol("FTP session is closed".to_string())),
        }
    }

    async fn change_dir(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(move |ftp| ftp.cwd(&path).map_err(|e| protocol("CWD", &path, e)))
            .await
    }

    async fn make_dir(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(move |ftp| ftp.mkdir(&path).map_err(|e| protocol("MKD", &path, e)))
            .await
    }

    async fn put_file(&mut self, local_path: &Path, remote_path: &str) -> Result<u64> {
        let local_path: PathBuf = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        self.call(move |ftp| {
            let mut file = std::fs::File::open(&local_path)?;
            ftp.transfer_type(FileType::Binary)
                .map_err(|e| protocol("TYPE I", &remote_path, e))?;
            ftp.put_file(&remote_path, &mut file)
                .map_err(|e| protocol("STOR", &remote_path, e))
        })
        .await
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.call(move |ftp| {
            ftp.nlst(Some(path.as_str()))
                .map_err(|e| protocol("NLST", &path, e))
        })
        .await
    }

    async fn delete_file(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.call(move |ftp| ftp.rm(&path).map_err(|e| protocol("DELE", &path, e)))
            .await
    }

    async fn quit(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        let result = self
            .call(|ftp| ftp.quit().map_err(|e| protocol("QUIT", "", e)))
            .await;
        self.stream = None;
        result
    }
}
