//! Content embedding for inlined resources
//!
//! Stylesheets and scripts are embedded as text; images become base64
//! `data:` URIs.

use std::path::Path;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{InlineError, InlineResult};

/// MIME label written into every fixed-mode data URI
pub const FIXED_IMAGE_MIME: &str = "image/jpg";

/// How the MIME type of an embedded image is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMime {
    /// Always `image/jpg`, whatever the file actually contains
    #[default]
    Fixed,
    /// Derive the label from the file extension, falling back to `image/jpg`
    Sniff,
}

impl FromStr for ImageMime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(ImageMime::Fixed),
            "sniff" => Ok(ImageMime::Sniff),
            other => Err(format!("unknown image mime policy '{other}' (expected fixed or sniff)")),
        }
    }
}

impl ImageMime {
    /// MIME type to advertise for the image at `path`
    #[must_use]
    pub fn mime_for(self, path: &Path) -> &'static str {
        match self {
            ImageMime::Fixed => FIXED_IMAGE_MIME,
            ImageMime::Sniff => mime_from_extension(path).unwrap_or(FIXED_IMAGE_MIME),
        }
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// Read a resolved file as text for `<style>` / `<script>` inlining
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn embed_text(path: &Path) -> InlineResult<String> {
    let bytes = std::fs::read(path).map_err(|e| InlineError::fs(path, e))?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::debug!(
                target: "site_inliner::embedder",
                "{} is not valid UTF-8, decoding lossily",
                path.display()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Read a resolved image and encode it as a `data:` URI
pub fn embed_data_uri(path: &Path, mime: ImageMime) -> InlineResult<String> {
    let bytes = std::fs::read(path).map_err(|e| InlineError::fs(path, e))?;
    Ok(data_uri(mime.mime_for(path), &bytes))
}

/// Format raw bytes as a base64 data URI
#[must_use]
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fixed_label_ignores_extension() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("logo.png");
        std::fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();

        let uri = embed_data_uri(&png, ImageMime::Fixed).unwrap();
        assert_eq!(uri, "data:image/jpg;base64,iVBORw==");
    }

    #[test]
    fn sniffed_label_follows_extension() {
        assert_eq!(ImageMime::Sniff.mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(ImageMime::Sniff.mime_for(Path::new("a.svg")), "image/svg+xml");
        assert_eq!(ImageMime::Sniff.mime_for(Path::new("a.jpeg")), "image/jpeg");
        // Unknown extensions are still accepted
        assert_eq!(ImageMime::Sniff.mime_for(Path::new("a.xyz")), "image/jpg");
        assert_eq!(ImageMime::Sniff.mime_for(Path::new("noext")), "image/jpg");
    }

    #[test]
    fn text_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        let css = dir.path().join("style.css");
        std::fs::write(&css, b"body{}\xff").unwrap();
        assert_eq!(embed_text(&css).unwrap(), "body{}\u{FFFD}");
    }

    #[test]
    fn missing_file_is_a_filesystem_error() {
        let err = embed_text(Path::new("/definitely/not/here.css")).unwrap_err();
        assert!(matches!(err, InlineError::Filesystem { .. }));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("Fixed".parse::<ImageMime>().unwrap(), ImageMime::Fixed);
        assert_eq!(" sniff ".parse::<ImageMime>().unwrap(), ImageMime::Sniff);
        assert!("guess".parse::<ImageMime>().is_err());
    }
}
