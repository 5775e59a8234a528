//! Test utilities shared by the integration suites

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use site_inliner::error::PreprocessError;
use site_inliner::{InlinerConfig, Preprocessor, UploadedFile};

/// A minimal page with the given head and body markup
#[allow(dead_code)]
pub fn create_test_html(head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{head}\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

/// Write each `(original name, bytes)` into `incoming` the way the transport
/// layer would, returning the upload set in order
#[allow(dead_code)]
pub fn stage_uploads(incoming: &Path, files: &[(&str, &[u8])]) -> Vec<UploadedFile> {
    files
        .iter()
        .enumerate()
        .map(|(i, (name, bytes))| {
            let temp_path = incoming.join(format!("upload-{i}"));
            fs::write(&temp_path, bytes).expect("failed to stage upload");
            UploadedFile::new(*name, temp_path)
        })
        .collect()
}

/// Configuration rooted at `root/uploads`
#[allow(dead_code)]
pub fn test_config(root: &Path) -> InlinerConfig {
    InlinerConfig::builder()
        .upload_dir(root.join("uploads"))
        .public_dir(root.join("public"))
        .build()
        .expect("test config should build")
}

/// Entries left directly under `dir`, or none if it does not exist
#[allow(dead_code)]
pub fn leftover_entries(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}

/// Stands in for the PHP interpreter by printing fixed markup
#[allow(dead_code)]
pub struct FakePhp {
    pub output: Vec<u8>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakePhp {
    pub fn printing(output: &str) -> Self {
        Self {
            output: output.as_bytes().to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Preprocessor for FakePhp {
    fn run(&self, source: &Path) -> Result<Vec<u8>, PreprocessError> {
        assert!(source.exists(), "preprocessor called on missing {}", source.display());
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.output.is_empty() {
            return Err(PreprocessError::EmptyOutput {
                source_path: source.to_path_buf(),
            });
        }
        Ok(self.output.clone())
    }
}
