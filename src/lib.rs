//! Flatten an uploaded web-site bundle into one self-contained HTML document.
//!
//! Stylesheets, scripts and images referenced by the entry document are
//! inlined, `url()` images inside CSS become data URIs, and every file that
//! is no longer needed is deleted. See [`pipeline::process_upload`] for the
//! end-to-end flow and [`server::router`] for the HTTP front end.

pub mod cli;
pub mod config;
pub mod css;
pub mod embedder;
pub mod error;
pub mod gc;
pub mod head;
pub mod pipeline;
pub mod preprocess;
pub mod resolver;
pub mod rewriter;
pub mod server;
pub mod workdir;

pub use config::InlinerConfig;
pub use embedder::ImageMime;
pub use error::{InlineError, InlineResult, PreprocessError};
pub use pipeline::{FlattenedSite, process_upload};
pub use preprocess::{PhpPreprocessor, Preprocessor};
pub use rewriter::{ReferenceKind, RewriteReport, Rewriter, UnresolvedReference};
pub use workdir::{UploadSet, UploadedFile, WorkingDirectory};
