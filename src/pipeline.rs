//! End-to-end processing of one upload
//!
//! normalize -> locate entry -> preprocess -> rewrite -> collect garbage ->
//! read output -> tear down. Everything happens inside a private working
//! directory that is removed on every exit path.

use std::fs;
use std::path::PathBuf;

use log::info;

use crate::config::InlinerConfig;
use crate::error::{InlineError, InlineResult};
use crate::gc::{GcReport, collect_garbage};
use crate::preprocess::{Preprocessor, is_php, render_to_sibling};
use crate::rewriter::{RewriteReport, Rewriter};
use crate::workdir::{UploadedFile, WorkingDirectory, base_name, locate_entry};

/// The flattened document, ready to hand back to the caller
#[derive(Debug, Clone)]
pub struct FlattenedSite {
    /// File name of the rewritten entry document, e.g. `index.html`
    pub file_name: String,
    pub html: Vec<u8>,
    pub rewrite: RewriteReport,
    pub gc: GcReport,
}

/// Flatten `uploads` into a single self-contained document
pub fn process_upload(
    config: &InlinerConfig,
    uploads: &[UploadedFile],
    preprocessor: &dyn Preprocessor,
) -> InlineResult<FlattenedSite> {
    if uploads.is_empty() {
        return Err(InlineError::InvalidUpload("no files uploaded".to_string()));
    }
    let entry_names = config.entry_names();
    let has_entry = uploads.iter().any(|upload| {
        base_name(&upload.original_name)
            .is_some_and(|name| entry_names.iter().any(|entry| name.ends_with(entry.as_str())))
    });
    if !has_entry {
        return Err(InlineError::MissingEntryDocument {
            expected: entry_names.join(" or "),
        });
    }

    let workdir = WorkingDirectory::create(config.upload_dir())?;
    let mut files = workdir.normalize(uploads)?;
    let mut entry = locate_entry(&files, entry_names)
        .cloned()
        .ok_or_else(|| InlineError::MissingEntryDocument {
            expected: entry_names.join(" or "),
        })?;
    info!(
        target: "site_inliner::pipeline",
        "Processing {} files in {}, entry {}",
        files.len(),
        workdir.path().display(),
        entry.display()
    );

    let templates: Vec<PathBuf> = files.iter().filter(|path| is_php(path)).cloned().collect();
    for template in templates {
        let rendered = render_to_sibling(preprocessor, &template)?;
        if template == entry {
            entry = rendered.clone();
        }
        if !files.contains(&rendered) {
            files.push(rendered);
        }
    }

    let rewrite = Rewriter::new(workdir.path(), config.image_mime()).rewrite_file(&entry)?;
    let gc = collect_garbage(&files, &entry, &rewrite.embedded_images)?;

    let html = fs::read(&entry).map_err(|e| InlineError::fs(&entry, e))?;
    let file_name = entry
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.html".to_string());

    info!(
        target: "site_inliner::pipeline",
        "Flattened {} ({} bytes, {} images embedded, {} files removed)",
        file_name,
        html.len(),
        rewrite.embedded_images.len(),
        gc.removed.len()
    );

    Ok(FlattenedSite {
        file_name,
        html,
        rewrite,
        gc,
    })
}
