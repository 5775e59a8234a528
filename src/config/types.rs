//! Core configuration types for site flattening
//!
//! This module contains the `InlinerConfig` struct shared by the library
//! pipeline, the HTTP server and the command-line bundler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::embedder::ImageMime;

/// Main configuration struct for flattening operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlinerConfig {
    /// Root directory under which per-request working directories are created.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) upload_dir: PathBuf,

    /// Directory served as static files by the HTTP server
    pub(crate) public_dir: PathBuf,

    pub(crate) bind_addr: String,
    pub(crate) port: u16,

    /// Executable used to render `.php` uploads into markup
    pub(crate) php_binary: String,

    /// Timeout in seconds for a single preprocessing run
    ///
    /// The child process is killed once this elapses and the request fails.
    ///
    /// Default: 30 seconds
    pub(crate) preprocess_timeout_secs: u64,

    /// MIME label policy for embedded images
    pub(crate) image_mime: ImageMime,

    /// Maximum accepted multipart body size in bytes
    pub(crate) max_upload_bytes: usize,

    /// File-name suffixes that identify the entry document, in priority order
    pub(crate) entry_names: Vec<String>,
}
