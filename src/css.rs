//! CSS `url()` inlining
//!
//! A text pass over raw stylesheet source: every `url(...)` token whose target
//! resolves inside the working directory is rewritten to a data URI. All other
//! text, including unresolved `url()` tokens, is copied through untouched.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::embedder::{ImageMime, embed_data_uri};
use crate::resolver::resolve;

lazy_static! {
    // Quoted forms may contain spaces and parens; the bare form may not.
    static ref CSS_URL_RE: Regex =
        Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
            .expect("BUG: hardcoded CSS url() regex is invalid");
}

/// Outcome of inlining one stylesheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssInlining {
    /// Rewritten stylesheet text
    pub css: String,
    /// Files embedded as data URIs, in first-seen order, without duplicates
    pub embedded: Vec<PathBuf>,
    /// `url()` targets that were left as written
    pub unresolved: Vec<String>,
}

impl CssInlining {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.embedded.is_empty()
    }
}

/// Every `url()` target in `css`, in source order
#[must_use]
pub fn find_urls(css: &str) -> Vec<&str> {
    CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| target_range(&caps).map(|range| &css[range]))
        .collect()
}

/// Byte range of the `url()` target within the whole input
fn target_range(caps: &Captures<'_>) -> Option<Range<usize>> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.range())
}

/// Replace every resolvable `url()` in `css` with an embedded data URI
///
/// Targets that are missing, empty, already `data:` URIs, or unreadable are
/// skipped and keep their original text.
#[must_use]
pub fn inline_css_urls(css: &str, base_dir: &Path, mime: ImageMime) -> CssInlining {
    let mut out = String::with_capacity(css.len());
    let mut embedded: Vec<PathBuf> = Vec::new();
    let mut unresolved = Vec::new();
    let mut encoded: HashMap<PathBuf, String> = HashMap::new();
    let mut last = 0;

    for caps in CSS_URL_RE.captures_iter(css) {
        let Some(range) = target_range(&caps) else {
            continue;
        };
        let target = &css[range.clone()];
        if target.trim().is_empty() {
            continue;
        }

        let Some(path) = resolve(base_dir, target) else {
            if !target.trim_start().to_ascii_lowercase().starts_with("data:") {
                log::debug!(target: "site_inliner::css", "Unresolved CSS url(): {target}");
                unresolved.push(target.to_string());
            }
            continue;
        };

        let data_uri = match encoded.get(&path) {
            Some(uri) => uri.clone(),
            None => match embed_data_uri(&path, mime) {
                Ok(uri) => {
                    encoded.insert(path.clone(), uri.clone());
                    uri
                }
                Err(e) => {
                    log::warn!(target: "site_inliner::css", "Skipping CSS image {target}: {e}");
                    unresolved.push(target.to_string());
                    continue;
                }
            },
        };

        log::info!(target: "site_inliner::css", "Found image in CSS: {target}");
        out.push_str(&css[last..range.start]);
        out.push_str(&data_uri);
        last = range.end;

        if !embedded.contains(&path) {
            embedded.push(path);
        }
    }
    out.push_str(&css[last..]);

    CssInlining {
        css: out,
        embedded,
        unresolved,
    }
}
