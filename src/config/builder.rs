//! Type-safe builder for `InlinerConfig` using the typestate pattern
//!
//! The upload directory is the only required field; `build()` is not
//! available until it has been set.

use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::InlinerConfig;
use crate::embedder::ImageMime;
use crate::error::{InlineError, InlineResult};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PHP_BINARY: &str = "php";
pub const DEFAULT_PREPROCESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_ENTRY_NAMES: [&str; 2] = ["index.html", "index.php"];

// Type states for the builder
pub struct WithUploadDir;

pub struct InlinerConfigBuilder<State = ()> {
    pub(crate) upload_dir: Option<PathBuf>,
    pub(crate) public_dir: PathBuf,
    pub(crate) bind_addr: String,
    pub(crate) port: u16,
    pub(crate) php_binary: String,
    pub(crate) preprocess_timeout_secs: u64,
    pub(crate) image_mime: ImageMime,
    pub(crate) max_upload_bytes: usize,
    pub(crate) entry_names: Vec<String>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for InlinerConfigBuilder<()> {
    fn default() -> Self {
        Self {
            upload_dir: None,
            public_dir: PathBuf::from("public"),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            php_binary: DEFAULT_PHP_BINARY.to_string(),
            preprocess_timeout_secs: DEFAULT_PREPROCESS_TIMEOUT_SECS,
            image_mime: ImageMime::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            entry_names: DEFAULT_ENTRY_NAMES.iter().map(ToString::to_string).collect(),
            _phantom: PhantomData,
        }
    }
}

impl InlinerConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> InlinerConfigBuilder<()> {
        InlinerConfigBuilder::default()
    }
}

impl InlinerConfigBuilder<()> {
    pub fn upload_dir(self, dir: impl Into<PathBuf>) -> InlinerConfigBuilder<WithUploadDir> {
        InlinerConfigBuilder {
            upload_dir: Some(dir.into()),
            public_dir: self.public_dir,
            bind_addr: self.bind_addr,
            port: self.port,
            php_binary: self.php_binary,
            preprocess_timeout_secs: self.preprocess_timeout_secs,
            image_mime: self.image_mime,
            max_upload_bytes: self.max_upload_bytes,
            entry_names: self.entry_names,
            _phantom: PhantomData,
        }
    }
}

// Build method only available when all required fields are set
impl InlinerConfigBuilder<WithUploadDir> {
    pub fn build(self) -> InlineResult<InlinerConfig> {
        let upload_dir = self
            .upload_dir
            .ok_or_else(|| InlineError::Config("upload_dir is required".to_string()))?;
        let upload_dir =
            std::path::absolute(&upload_dir).map_err(|e| InlineError::fs(&upload_dir, e))?;

        if self.entry_names.iter().all(|name| name.trim().is_empty()) {
            return Err(InlineError::Config(
                "at least one entry document name is required".to_string(),
            ));
        }
        if self.preprocess_timeout_secs == 0 {
            return Err(InlineError::Config(
                "preprocess_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(InlinerConfig {
            upload_dir,
            public_dir: self.public_dir,
            bind_addr: self.bind_addr,
            port: self.port,
            php_binary: self.php_binary,
            preprocess_timeout_secs: self.preprocess_timeout_secs,
            image_mime: self.image_mime,
            max_upload_bytes: self.max_upload_bytes,
            entry_names: self
                .entry_names
                .into_iter()
                .filter(|name| !name.trim().is_empty())
                .collect(),
        })
    }
}

// Builder methods available at any state
impl<State> InlinerConfigBuilder<State> {
    #[must_use]
    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn php_binary(mut self, binary: impl Into<String>) -> Self {
        self.php_binary = binary.into();
        self
    }

    /// Set the preprocessing timeout
    ///
    /// A hung `php` run is killed after this many seconds and the request
    /// fails with a preprocessing error.
    #[must_use]
    pub fn preprocess_timeout_secs(mut self, secs: u64) -> Self {
        self.preprocess_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn image_mime(mut self, mime: ImageMime) -> Self {
        self.image_mime = mime;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Replace the entry-document suffixes
    ///
    /// # Example
    /// ```rust
    /// # use site_inliner::config::InlinerConfig;
    /// # fn main() -> Result<(), site_inliner::InlineError> {
    /// let config = InlinerConfig::builder()
    ///     .upload_dir("./uploads")
    ///     .entry_names(["index.htm", "index.html"])
    ///     .build()?;
    /// assert_eq!(config.entry_names(), ["index.htm", "index.html"]);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn entry_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_names = names.into_iter().map(Into::into).collect();
        self
    }
}
