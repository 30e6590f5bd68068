//! Data models and structures
//!
//! Defines assets and their size variants, per-pass transfer outcomes, the
//! host-owned metadata shapes the engine reads, and process configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opaque host-assigned identifier for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Transferred,
    Failed,
}

/// Transfer lifecycle of a single asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Created,
    Uploading,
    AllTransferred,
    PartiallyFailed,
    LocallyReclaimed,
    Removed,
}

impl AssetState {
    pub fn can_advance_to(self, next: AssetState) -> bool {
        use AssetState::*;
        matches!(
            (self, next),
            (Created, Uploading)
                | (Created, Removed)
                | (Uploading, AllTransferred)
                | (Uploading, PartiallyFailed)
                | (AllTransferred, LocallyReclaimed)
                | (AllTransferred, Removed)
                | (PartiallyFailed, Removed)
                | (LocallyReclaimed, Removed)
        )
    }

    pub fn advance(self, next: AssetState) -> Result<AssetState> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(Error::Invariant(format!(
                "Illegal asset transition {:?} -> {:?}",
                self, next
            )))
        }
    }
}

/// A named derived rendition of an asset's original.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub local_path: PathBuf,
    pub status: TransferStatus,
}

impl Variant {
    pub fn new(name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            status: TransferStatus::Pending,
        }
    }
}

/// One original file plus its size variants.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: AssetId,
    pub local_original: PathBuf,
    pub original_status: TransferStatus,
    pub variants: Vec<Variant>,
    pub state: AssetState,
}

impl Asset {
    pub fn new(id: AssetId, local_original: impl Into<PathBuf>, variants: Vec<Variant>) -> Self {
        Self {
            id,
            local_original: local_original.into(),
            original_status: TransferStatus::Pending,
            variants,
            state: AssetState::Created,
        }
    }

    /// Build an asset from the host's relative storage path and its size
    /// metadata. Variants sit next to the original.
    pub fn from_metadata(
        id: AssetId,
        local_base: &Path,
        relative_file: &str,
        metadata: &AttachmentMetadata,
    ) -> Self {
        let local_original = local_base.join(relative_file.trim_start_matches('/'));
        let dir = local_original
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| local_base.to_path_buf());

        let variants = metadata
            .sizes
            .iter()
            .filter(|(_, size)| !size.file.is_empty())
            .map(|(name, size)| Variant::new(name.clone(), dir.join(&size.file)))
            .collect();

        Self::new(id, local_original, variants)
    }

    /// Every local file belonging to the asset, original first.
    pub fn local_files(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.local_original.as_path())
            .chain(self.variants.iter().map(|v| v.local_path.as_path()))
    }

    pub fn set_state(&mut self, next: AssetState) -> Result<()> {
        self.state = self.state.advance(next)?;
        Ok(())
    }
}

/// Result of one upload pass over an asset. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub all_transferred: bool,
    /// Remote paths whose transfer failed.
    pub failed: Vec<String>,
}

impl TransferOutcome {
    pub fn from_asset(asset: &Asset, failed: Vec<String>) -> Self {
        let all_transferred = asset.original_status == TransferStatus::Transferred
            && asset
                .variants
                .iter()
                .all(|v| v.status == TransferStatus::Transferred);

        Self {
            all_transferred,
            failed,
        }
    }

    pub fn failed_entirely() -> Self {
        Self {
            all_transferred: false,
            failed: Vec::new(),
        }
    }
}

/// Size entry in the host's attachment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeMetadata {
    pub file: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, rename = "mime-type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Host-owned attachment metadata, as produced by its image pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub sizes: BTreeMap<String, SizeMetadata>,
}

impl AttachmentMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One entry of a responsive-image source set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrcsetSource {
    pub url: String,
    pub descriptor: String,
    pub value: u32,
}

/// Responsive-image source set keyed by descriptor value.
pub type Srcset = BTreeMap<String, SrcsetSource>;

/// Freshly uploaded file as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file: PathBuf,
    pub url: String,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
}

/// Host upload-directory descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDirs {
    pub path: PathBuf,
    pub url: String,
    pub subdir: String,
    pub basedir: PathBuf,
    pub baseurl: String,
}

// Configuration
pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub local_base: PathBuf,
    pub local_base_url: String,
    pub remote_base_url: String,
    /// Applies to connecting and to every read and write on the control
    /// connection, so a stalled server surfaces as an error instead of a hang.
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        let timeout = match lookup("REMOTE_FTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("REMOTE_FTP_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout == 0 {
            return Err(Error::Config(
                "REMOTE_FTP_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            endpoint: with_default_port(&required("REMOTE_FTP_ENDPOINT")?)?,
            username: required("REMOTE_FTP_USERNAME")?,
            password: required("REMOTE_FTP_PASSWORD")?,
            local_base: PathBuf::from(required("LOCAL_BASE_DIR")?),
            local_base_url: required("LOCAL_BASE_URL")?.trim_end_matches('/').to_string(),
            remote_base_url: required("REMOTE_BASE_URL")?.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout),
        })
    }
}

/// Normalize `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6
/// address into `host:port`.
fn with_default_port(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if let Ok(addr) = endpoint.parse::<Ipv6Addr>() {
        return Ok(format!("[{}]:{}", addr, DEFAULT_FTP_PORT));
    }
    if endpoint.ends_with(']') || !endpoint.contains(':') {
        return Ok(format!("{}:{}", endpoint, DEFAULT_FTP_PORT));
    }

    match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(endpoint.to_string())
        }
        _ => Err(Error::Config(format!(
            "REMOTE_FTP_ENDPOINT has an invalid port: {}",
            endpoint
        ))),
    }
}
