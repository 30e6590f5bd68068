//! Read-path URL rewriting.
//!
//! Every URL under the local base URL is pointed at the remote base URL,
//! whether or not the referenced file has actually reached the remote store.

use crate::models::{Srcset, UploadDirs};
use crate::paths::PathTranslator;

#[derive(Debug, Clone)]
pub struct UrlRewriter {
    paths: PathTranslator,
}

impl UrlRewriter {
    pub fn new(paths: PathTranslator) -> Self {
        Self { paths }
    }

    pub fn rewrite_url(&self, url: &str) -> String {
        self.paths.to_public_url(url)
    }

    /// Rewrite the `url` of every source set entry in place.
    pub fn rewrite_srcset(&self, sources: &mut Srcset) {
        for source in sources.values_mut() {
            source.url = self.paths.to_public_url(&source.url);
        }
    }

    /// Point the host's upload base URL at the remote store.
    pub fn rewrite_upload_dirs(&self, dirs: &mut UploadDirs) {
        let remote_base = self.paths.remote_base_url();
        if let Some(subpath) = dirs.url.strip_prefix(dirs.baseurl.as_str()) {
            dirs.url = format!("{}{}", remote_base, subpath);
        }
        dirs.baseurl = remote_base.to_string();
    }
}
