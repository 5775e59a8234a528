//! Per-request working directory and path normalization
//!
//! Every request owns a fresh `upload_dir/<uuid>/` directory. All uploaded
//! files are flattened into it by base name, and the whole directory is
//! removed when the handle is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

use crate::error::{InlineError, InlineResult};

/// One uploaded file as handed over by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name the client gave the file, possibly with directory components
    pub original_name: String,
    /// Where the transport stored the bytes
    pub temp_path: PathBuf,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            original_name: original_name.into(),
            temp_path: temp_path.into(),
        }
    }
}

/// Uploads in the order they were received
pub type UploadSet = Vec<UploadedFile>;

/// Base file name of an uploaded path, accepting both separators
#[must_use]
pub fn base_name(original: &str) -> Option<&str> {
    let name = original.rsplit(['/', '\\']).next()?;
    match name {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

/// A flat directory that lives as long as one request
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create `root/<uuid-v4>/`, creating `root` too if needed
    pub fn create(root: &Path) -> InlineResult<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path).map_err(|e| InlineError::fs(&path, e))?;
        debug!(target: "site_inliner::workdir", "Created working directory {}", path.display());
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move every upload into this directory under its base name
    ///
    /// Returns the destination paths in upload order. When two uploads share
    /// a base name the later one overwrites the earlier, and the returned list
    /// holds that path once, at the position of its last occurrence.
    pub fn normalize(&self, uploads: &[UploadedFile]) -> InlineResult<Vec<PathBuf>> {
        let mut placed: Vec<PathBuf> = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = base_name(&upload.original_name).ok_or_else(|| {
                InlineError::InvalidUpload(format!(
                    "unusable file name {:?}",
                    upload.original_name
                ))
            })?;
            let dest = self.path.join(name);
            move_file(&upload.temp_path, &dest)?;
            debug!(
                target: "site_inliner::workdir",
                "{} -> {}",
                upload.original_name,
                dest.display()
            );
            placed.retain(|p| p != &dest);
            placed.push(dest);
        }
        Ok(placed)
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!(target: "site_inliner::workdir", "Removed working directory {}", self.path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    target: "site_inliner::workdir",
                    "Failed to remove working directory {}: {e}",
                    self.path.display()
                );
            }
        }
    }
}

/// Rename, falling back to copy + remove when the source is on another filesystem
fn move_file(from: &Path, to: &Path) -> InlineResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| InlineError::fs(from, e))?;
    if let Err(e) = fs::remove_file(from) {
        warn!(target: "site_inliner::workdir", "Failed to remove {}: {e}", from.display());
    }
    Ok(())
}

/// First path whose file name ends with one of `entry_names`
#[must_use]
pub fn locate_entry<'a>(paths: &'a [PathBuf], entry_names: &[String]) -> Option<&'a PathBuf> {
    paths.iter().find(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| entry_names.iter().any(|entry| name.ends_with(entry.as_str())))
    })
}
