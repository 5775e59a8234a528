//! Getter methods for `InlinerConfig`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::InlinerConfig;
use crate::embedder::ImageMime;

impl InlinerConfig {
    #[must_use]
    pub fn upload_dir(&self) -> &PathBuf {
        &self.upload_dir
    }

    #[must_use]
    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    #[must_use]
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Combined listen address, if `bind_addr` parses as an IP
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port).parse().ok()
    }

    #[must_use]
    pub fn php_binary(&self) -> &str {
        &self.php_binary
    }

    #[must_use]
    pub fn preprocess_timeout(&self) -> Duration {
        Duration::from_secs(self.preprocess_timeout_secs)
    }

    #[must_use]
    pub fn image_mime(&self) -> ImageMime {
        self.image_mime
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    #[must_use]
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }
}
