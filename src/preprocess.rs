//! Server-side template preprocessing
//!
//! PHP sources are executed by an external interpreter and their standard
//! output becomes plain markup. The rest of the pipeline only ever sees the
//! generated `.html` sibling.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use log::{debug, info};
use tokio::process::Command;
use tokio::runtime::Handle;

use crate::error::{InlineError, InlineResult, PreprocessError};

/// Turns a template file into markup bytes
pub trait Preprocessor: Send + Sync {
    /// Execute `source` and return what it printed
    fn run(&self, source: &Path) -> Result<Vec<u8>, PreprocessError>;
}

/// Runs sources through the `php` command-line interpreter
///
/// `run` blocks; call it from a `spawn_blocking` worker or a plain thread,
/// never from inside an async task.
#[derive(Debug, Clone)]
pub struct PhpPreprocessor {
    binary: String,
    timeout: Duration,
}

impl PhpPreprocessor {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn execute(&self, source: &Path) -> Result<Output, PreprocessError> {
        let mut command = Command::new(&self.binary);
        command
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Relative includes resolve against the script's own directory
        if let Some(dir) = source.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        debug!(target: "site_inliner::preprocess", "Running {} {}", self.binary, source.display());
        let child = command.spawn().map_err(|source| PreprocessError::Spawn {
            program: self.binary.clone(),
            source,
        })?;

        // Dropping the child on timeout kills it
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(PreprocessError::Timeout {
                timeout: self.timeout,
            }),
        }
    }
}

impl Preprocessor for PhpPreprocessor {
    fn run(&self, source: &Path) -> Result<Vec<u8>, PreprocessError> {
        let output = block_on(self.execute(source))??;
        if !output.status.success() {
            return Err(PreprocessError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(PreprocessError::EmptyOutput {
                source_path: source.to_path_buf(),
            });
        }
        Ok(output.stdout)
    }
}

/// Drive `future` on the surrounding runtime, or on a private one when the
/// caller has none
fn block_on<F: Future>(future: F) -> Result<F::Output, PreprocessError> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(future))
        }
    }
}

/// Whether `path` is a template that must be preprocessed
#[must_use]
pub fn is_php(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
}

/// Path of the generated markup for a template: `index.php` -> `index.html`
#[must_use]
pub fn rendered_path(source: &Path) -> PathBuf {
    source.with_extension("html")
}

/// Run `source` through `preprocessor` and write the output next to it
///
/// Returns the path of the written `.html` file.
pub fn render_to_sibling(preprocessor: &dyn Preprocessor, source: &Path) -> InlineResult<PathBuf> {
    let html = preprocessor.run(source)?;
    let target = rendered_path(source);
    fs::write(&target, &html).map_err(|e| InlineError::fs(&target, e))?;
    info!(
        target: "site_inliner::preprocess",
        "Rendered {} ({} bytes)",
        target.display(),
        html.len()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Echo;

    impl Preprocessor for Echo {
        fn run(&self, source: &Path) -> Result<Vec<u8>, PreprocessError> {
            Ok(fs::read(source)?)
        }
    }

    #[test]
    fn rendered_path_swaps_extension() {
        assert_eq!(rendered_path(Path::new("/w/index.php")), PathBuf::from("/w/index.html"));
        assert!(is_php(Path::new("a.PHP")));
        assert!(!is_php(Path::new("a.phtml")));
    }

    #[test]
    fn render_writes_sibling() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("index.php");
        fs::write(&source, "<html></html>").unwrap();

        let out = render_to_sibling(&Echo, &source).unwrap();
        assert_eq!(out, dir.path().join("index.html"));
        assert_eq!(fs::read_to_string(out).unwrap(), "<html></html>");
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("index.php");
        fs::write(&source, "<?php echo 1;").unwrap();

        let php = PhpPreprocessor::new("site-inliner-no-such-binary", Duration::from_secs(1));
        let err = php.run(&source).unwrap_err();
        assert!(matches!(err, PreprocessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn hung_process_times_out() {
        // `sleep 30` stands in for a script that never finishes
        let sleeper = PhpPreprocessor::new("sleep", Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = sleeper.run(Path::new("30")).unwrap_err();
        assert!(matches!(err, PreprocessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_applies_inside_blocking_worker() {
        let sleeper = PhpPreprocessor::new("sleep", Duration::from_millis(200));
        let err = tokio::task::spawn_blocking(move || sleeper.run(Path::new("30")))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn silent_success_is_empty_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("anything");
        let silent = PhpPreprocessor::new("true", Duration::from_secs(5));
        let err = silent.run(&source).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyOutput { .. }));
    }
}
