//! Translation between local paths, remote paths and public URLs.
//!
//! All functions here are pure. A local path that does not sit under the
//! configured base is passed through unchanged rather than rejected, so the
//! caller ends up addressing a remote path that mirrors the full local path.

use std::path::{Path, PathBuf};

/// A local file and the remote path it is mirrored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub local: PathBuf,
    pub remote: String,
}

#[derive(Debug, Clone)]
pub struct PathTranslator {
    local_base: PathBuf,
    local_base_url: String,
    remote_base_url: String,
}

impl PathTranslator {
    pub fn new(
        local_base: impl Into<PathBuf>,
        local_base_url: impl Into<String>,
        remote_base_url: impl Into<String>,
    ) -> Self {
        Self {
            local_base: local_base.into(),
            local_base_url: local_base_url.into().trim_end_matches('/').to_string(),
            remote_base_url: remote_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn local_base(&self) -> &Path {
        &self.local_base
    }

    pub fn remote_base_url(&self) -> &str {
        &self.remote_base_url
    }

    /// Remote path for a local file: the local base is stripped and the
    /// remainder is rooted at `/`.
    pub fn to_remote(&self, local_path: &Path) -> String {
        to_remote(local_path, &self.local_base)
    }

    pub fn pair(&self, local_path: &Path) -> PathPair {
        PathPair {
            local: local_path.to_path_buf(),
            remote: self.to_remote(local_path),
        }
    }

    pub fn to_public_url(&self, local_url: &str) -> String {
        to_public_url(local_url, &self.local_base_url, &self.remote_base_url)
    }

    /// Public URL for a freshly uploaded file.
    ///
    /// The host may report the file under a URL whose base differs from the
    /// configured local base URL, so the base is recovered from the URL itself
    /// by removing the remote-relative path from its end.
    pub fn upload_url(&self, local_path: &Path, local_url: &str) -> String {
        let remote = self.to_remote(local_path);
        match local_url.strip_suffix(remote.as_str()) {
            Some(_) if remote != "/" => format!("{}{}", self.remote_base_url, remote),
            _ => self.to_public_url(local_url),
        }
    }
}

pub fn to_remote(local_path: &Path, local_base: &Path) -> String {
    match local_path.strip_prefix(local_base) {
        Ok(relative) => {
            let segments: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("/{}", segments.join("/"))
        }
        Err(_) => local_path.to_string_lossy().into_owned(),
    }
}

pub fn to_public_url(local_url: &str, local_base_url: &str, remote_base_url: &str) -> String {
    let local_base_url = local_base_url.trim_end_matches('/');
    if local_base_url.is_empty() {
        return local_url.to_string();
    }

    match local_url.strip_prefix(local_base_url) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", remote_base_url.trim_end_matches('/'), rest)
        }
        _ => local_url.to_string(),
    }
}

/// Directory part of a remote path. The root maps to `/`.
pub fn remote_parent(remote_path: &str) -> String {
    match remote_path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_string(),
        _ => "/".to_string(),
    }
}

/// Final segment of a remote path.
pub fn remote_file_name(remote_path: &str) -> &str {
    remote_path
        .trim_end_matches('/')
        .rsplit_once('/')
        .map_or(remote_path, |(_, name)| name)
}
