//! Error types for site flattening
//!
//! Unresolved references are deliberately absent here: a missing stylesheet,
//! script or image is recorded in the rewrite report and the reference is
//! left untouched.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for flattening operations
pub type InlineResult<T> = Result<T, InlineError>;

/// Error types for the flattening pipeline
#[derive(Debug, thiserror::Error)]
pub enum InlineError {
    /// No uploaded file matched the entry-document naming rule
    #[error("No entry document found (expected a file named {expected})")]
    MissingEntryDocument { expected: String },

    /// The upload itself was malformed (empty set, unusable file name)
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// A read, write, rename or delete failed
    #[error("Filesystem operation failed on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The streaming HTML rewriter rejected the document
    #[error("HTML rewrite failed: {0}")]
    Markup(String),

    /// The external preprocessing step failed
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    /// Configuration could not be built
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl InlineError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InlineError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the server
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            InlineError::MissingEntryDocument { .. } | InlineError::InvalidUpload(_)
        )
    }
}

/// Failure of the external preprocessing collaborator
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// The executable could not be started
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time and was killed
    #[error("Timed out after {} seconds", timeout.as_secs())]
    Timeout { timeout: Duration },

    /// The process exited unsuccessfully
    #[error("Exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The process succeeded but printed nothing
    #[error("Produced no output for {}", source_path.display())]
    EmptyOutput { source_path: PathBuf },

    /// Reading the process pipes failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_user_facing() {
        let err = InlineError::MissingEntryDocument {
            expected: "index.html or index.php".to_string(),
        };
        assert!(err.is_user_error());
        assert!(err.to_string().contains("index.html or index.php"));
    }

    #[test]
    fn filesystem_and_preprocess_are_internal() {
        let fs_err = InlineError::fs(
            "uploads/a.css",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!fs_err.is_user_error());
        assert!(fs_err.to_string().contains("uploads/a.css"));

        let pre: InlineError = PreprocessError::Timeout {
            timeout: Duration::from_secs(5),
        }
        .into();
        assert!(!pre.is_user_error());
        assert_eq!(pre.to_string(), "Preprocessing failed: Timed out after 5 seconds");
    }
}
