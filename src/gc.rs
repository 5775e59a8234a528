//! Post-rewrite cleanup of the working set

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{InlineError, InlineResult};

/// Files handled by one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub removed: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Delete every file in `files` except `output` and the embedded images
///
/// Files that are already gone are skipped. Any other failure aborts the
/// request.
pub fn collect_garbage(
    files: &[PathBuf],
    output: &Path,
    embedded: &BTreeSet<PathBuf>,
) -> InlineResult<GcReport> {
    let mut report = GcReport::default();
    for file in files {
        if file == output || embedded.contains(file) {
            report.kept.push(file.clone());
            continue;
        }
        match fs::remove_file(file) {
            Ok(()) => {
                debug!(target: "site_inliner::gc", "Removed {}", file.display());
                report.removed.push(file.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(InlineError::fs(file, e)),
        }
    }
    Ok(report)
}
