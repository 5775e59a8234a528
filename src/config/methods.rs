//! Environment loading for `InlinerConfig`

use super::builder::{DEFAULT_PORT, DEFAULT_PREPROCESS_TIMEOUT_SECS};
use super::types::InlinerConfig;
use crate::embedder::ImageMime;
use crate::error::{InlineError, InlineResult};

pub const ENV_PORT: &str = "PORT";
pub const ENV_UPLOAD_DIR: &str = "SITE_INLINER_UPLOAD_DIR";
pub const ENV_PUBLIC_DIR: &str = "SITE_INLINER_PUBLIC_DIR";
pub const ENV_PHP: &str = "SITE_INLINER_PHP";
pub const ENV_PHP_TIMEOUT_SECS: &str = "SITE_INLINER_PHP_TIMEOUT_SECS";
pub const ENV_IMAGE_MIME: &str = "SITE_INLINER_IMAGE_MIME";

impl InlinerConfig {
    /// Build a configuration from the process environment
    ///
    /// Unset variables keep their defaults; malformed values are rejected
    /// rather than silently ignored.
    pub fn from_env() -> InlineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`InlinerConfig::from_env`] but reads through `lookup`
    pub fn from_lookup<F>(lookup: F) -> InlineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upload_dir = lookup(ENV_UPLOAD_DIR).unwrap_or_else(|| "uploads".to_string());
        let mut builder = InlinerConfig::builder().upload_dir(upload_dir);

        if let Some(dir) = lookup(ENV_PUBLIC_DIR) {
            builder = builder.public_dir(dir);
        }
        if let Some(php) = lookup(ENV_PHP) {
            builder = builder.php_binary(php);
        }

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| InlineError::Config(format!("{ENV_PORT}={raw}: {e}")))?,
            None => DEFAULT_PORT,
        };

        let timeout = match lookup(ENV_PHP_TIMEOUT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| InlineError::Config(format!("{ENV_PHP_TIMEOUT_SECS}={raw}: {e}")))?,
            None => DEFAULT_PREPROCESS_TIMEOUT_SECS,
        };

        let image_mime = match lookup(ENV_IMAGE_MIME) {
            Some(raw) => raw.parse::<ImageMime>().map_err(InlineError::Config)?,
            None => ImageMime::default(),
        };

        builder
            .port(port)
            .preprocess_timeout_secs(timeout)
            .image_mime(image_mime)
            .build()
    }
}
