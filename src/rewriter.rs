//! Entry-document rewriting
//!
//! Streams the entry document through the inlining passes in a fixed order:
//!
//! 1. `<link rel=stylesheet>` becomes `<style>` with the file's text
//! 2. `url()` tokens inside every `<style>` become data URIs
//! 3. `<script src>` becomes an inline `<script>`
//! 4. `<img src>` gets a data URI
//! 5. head-only elements sitting directly in `<body>` move to `<head>`
//!
//! Steps 1 to 4 share one pass over the markup, step 5 is a second pass (see
//! [`crate::head`]). Bytes no handler touches are copied through unchanged,
//! and any reference that does not resolve is left exactly as written.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use html_escape::encode_double_quoted_attribute;
use lazy_static::lazy_static;
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, text};
use log::{debug, info};
use regex::Regex;

use crate::css::inline_css_urls;
use crate::embedder::{ImageMime, embed_data_uri, embed_text};
use crate::error::{InlineError, InlineResult};
use crate::head::repair_head;
use crate::resolver::resolve;

lazy_static! {
    static ref SCRIPT_CLOSE_RE: Regex =
        Regex::new(r"(?i)<(/script)").expect("BUG: hardcoded script close regex is invalid");
    static ref STYLE_CLOSE_RE: Regex =
        Regex::new(r"(?i)<(/style)").expect("BUG: hardcoded style close regex is invalid");
}

/// What kind of markup a reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Stylesheet,
    CssUrl,
    Script,
    Image,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceKind::Stylesheet => "stylesheet",
            ReferenceKind::CssUrl => "css url",
            ReferenceKind::Script => "script",
            ReferenceKind::Image => "image",
        };
        f.write_str(name)
    }
}

/// A reference that was left untouched because nothing matched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub kind: ReferenceKind,
    pub reference: String,
}

/// Tally of one rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Image files now embedded in the document; these survive cleanup
    pub embedded_images: BTreeSet<PathBuf>,
    pub stylesheets_inlined: usize,
    pub css_urls_inlined: usize,
    pub scripts_inlined: usize,
    pub images_inlined: usize,
    pub moved_to_head: usize,
    pub unresolved: Vec<UnresolvedReference>,
}

impl RewriteReport {
    /// Whether any pass changed the document
    #[must_use]
    pub fn changed(&self) -> bool {
        self.stylesheets_inlined
            + self.css_urls_inlined
            + self.scripts_inlined
            + self.images_inlined
            + self.moved_to_head
            > 0
    }

    fn unresolved(&mut self, kind: ReferenceKind, reference: &str) {
        debug!(target: "site_inliner::rewriter", "Unresolved {kind} reference: {reference}");
        self.unresolved.push(UnresolvedReference {
            kind,
            reference: reference.to_string(),
        });
    }
}

/// Rewrites documents against the files in one flat directory
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'a> {
    base_dir: &'a Path,
    mime: ImageMime,
}

impl<'a> Rewriter<'a> {
    pub fn new(base_dir: &'a Path, mime: ImageMime) -> Self {
        Self { base_dir, mime }
    }

    /// Rewrite the document at `path` in place
    pub fn rewrite_file(&self, path: &Path) -> InlineResult<RewriteReport> {
        let source = embed_text(path)?;
        let (output, report) = self.rewrite(&source)?;

        fs::write(path, output.as_bytes()).map_err(|e| InlineError::fs(path, e))?;
        info!(
            target: "site_inliner::rewriter",
            "Rewrote {}: {} stylesheets, {} css images, {} scripts, {} images, {} moved, {} unresolved",
            path.display(),
            report.stylesheets_inlined,
            report.css_urls_inlined,
            report.scripts_inlined,
            report.images_inlined,
            report.moved_to_head,
            report.unresolved.len()
        );
        Ok(report)
    }

    /// Run every pass over `html`
    pub fn rewrite(&self, html: &str) -> InlineResult<(String, RewriteReport)> {
        let report = RefCell::new(RewriteReport::default());
        let inlined = self.inline_resources(html, &report)?;
        let mut report = report.into_inner();
        let repaired = repair_head(&inlined, &mut report)?;
        Ok((repaired, report))
    }

    /// Steps 1 to 4 in one streaming pass
    fn inline_resources(&self, html: &str, report: &RefCell<RewriteReport>) -> InlineResult<String> {
        let mut output = Vec::with_capacity(html.len());
        let mut style_text = String::new();

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("link[rel][href]", |el| {
                        let rel = el.get_attribute("rel").unwrap_or_default();
                        if !rel
                            .split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                        {
                            return Ok(());
                        }
                        let href = el.get_attribute("href").unwrap_or_default();
                        let Some(path) = resolve(self.base_dir, &href) else {
                            report.borrow_mut().unresolved(ReferenceKind::Stylesheet, &href);
                            return Ok(());
                        };

                        let css = self.inline_css(&embed_text(&path)?, report);
                        let css = STYLE_CLOSE_RE.replace_all(&css, r"<\$1");
                        let media = el
                            .get_attribute("media")
                            .map(|media| format!(" media=\"{}\"", encode_double_quoted_attribute(&media)))
                            .unwrap_or_default();
                        el.replace(&format!("<style{media}>\n{css}\n</style>"), ContentType::Html);
                        report.borrow_mut().stylesheets_inlined += 1;
                        Ok(())
                    }),
                    // Style text can arrive in several chunks
                    text!("style", |chunk| {
                        style_text.push_str(chunk.as_str());
                        if !chunk.last_in_text_node() {
                            chunk.remove();
                            return Ok(());
                        }
                        let css = std::mem::take(&mut style_text);
                        chunk.replace(&self.inline_css(&css, report), ContentType::Html);
                        Ok(())
                    }),
                    element!("script[src]", |el| {
                        let src = el.get_attribute("src").unwrap_or_default();
                        let Some(path) = resolve(self.base_dir, &src) else {
                            report.borrow_mut().unresolved(ReferenceKind::Script, &src);
                            return Ok(());
                        };

                        let js = embed_text(&path)?;
                        let js = SCRIPT_CLOSE_RE.replace_all(&js, r"<\$1");
                        let script_type = el
                            .get_attribute("type")
                            .map(|t| format!(" type=\"{}\"", encode_double_quoted_attribute(&t)))
                            .unwrap_or_default();
                        el.replace(&format!("<script{script_type}>\n{js}\n</script>"), ContentType::Html);
                        report.borrow_mut().scripts_inlined += 1;
                        Ok(())
                    }),
                    element!("img[src]", |el| {
                        let src = el.get_attribute("src").unwrap_or_default();
                        let Some(path) = resolve(self.base_dir, &src) else {
                            if !src.trim_start().to_ascii_lowercase().starts_with("data:") {
                                report.borrow_mut().unresolved(ReferenceKind::Image, &src);
                            }
                            return Ok(());
                        };

                        el.set_attribute("src", &embed_data_uri(&path, self.mime)?)?;
                        let mut report = report.borrow_mut();
                        report.embedded_images.insert(path);
                        report.images_inlined += 1;
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );
        rewriter.write(html.as_bytes()).map_err(rewrite_error)?;
        rewriter.end().map_err(rewrite_error)?;

        String::from_utf8(output).map_err(|e| InlineError::Markup(e.to_string()))
    }

    /// Replace `url()` images in `css`, recording what was embedded
    fn inline_css(&self, css: &str, report: &RefCell<RewriteReport>) -> String {
        let result = inline_css_urls(css, self.base_dir, self.mime);
        let mut report = report.borrow_mut();
        for reference in &result.unresolved {
            report.unresolved(ReferenceKind::CssUrl, reference);
        }
        report.css_urls_inlined += result.embedded.len();
        report.embedded_images.extend(result.embedded);
        result.css
    }
}

/// Recover our own error from a failed handler, or describe the rewriter's
pub(crate) fn rewrite_error(err: RewritingError) -> InlineError {
    match err {
        RewritingError::ContentHandlerError(inner) => match inner.downcast::<InlineError>() {
            Ok(err) => *err,
            Err(other) => InlineError::Markup(other.to_string()),
        },
        other => InlineError::Markup(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_with(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, bytes) in files {
            fs::write(dir.path().join(name), bytes).unwrap();
        }
        dir
    }

    fn rewrite(dir: &TempDir, html: &str) -> (String, RewriteReport) {
        Rewriter::new(dir.path(), ImageMime::Fixed)
            .rewrite(html)
            .unwrap()
    }

    #[test]
    fn stylesheet_becomes_style_with_media() {
        let dir = dir_with(&[("main.css", b"p{color:red}")]);
        let (html, report) = rewrite(
            &dir,
            r#"<head><link rel="Stylesheet" href="css/main.css?v=2" media="print"></head>"#,
        );
        assert_eq!(
            html,
            "<head><style media=\"print\">\np{color:red}\n</style></head>"
        );
        assert_eq!(report.stylesheets_inlined, 1);
    }

    #[test]
    fn inlined_stylesheet_images_are_embedded() {
        let dir = dir_with(&[("main.css", b"b{background:url(a.jpg)}"), ("a.jpg", b"abc")]);
        let (html, report) = rewrite(&dir, r#"<link rel=stylesheet href=main.css>"#);
        assert!(html.contains("url(data:image/jpg;base64,YWJj)"));
        assert!(!html.contains("a.jpg"));
        assert_eq!(report.embedded_images, BTreeSet::from([dir.path().join("a.jpg")]));
    }

    #[test]
    fn unresolved_references_are_untouched() {
        let dir = TempDir::new().unwrap();
        let input = r#"<head><link rel="stylesheet" href="missing-ref.css"><script src="x.js"></script></head><body><img src="nope.png"></body>"#;
        let (html, report) = rewrite(&dir, input);
        assert_eq!(html, input);
        let kinds: Vec<_> = report.unresolved.iter().map(|u| u.kind).collect();
        assert_eq!(
            kinds,
            vec![ReferenceKind::Stylesheet, ReferenceKind::Script, ReferenceKind::Image]
        );
        assert!(!report.changed());
    }

    #[test]
    fn script_is_inlined_and_close_tag_escaped() {
        let dir = dir_with(&[("app.js", b"document.write('</SCRIPT>');")]);
        let (html, report) = rewrite(
            &dir,
            r#"<script type="module" src="js/app.js" defer></script>"#,
        );
        assert_eq!(
            html,
            "<script type=\"module\">\ndocument.write('<\\/SCRIPT>');\n</script>"
        );
        assert_eq!(report.scripts_inlined, 1);
    }

    #[test]
    fn image_src_is_replaced_in_place() {
        let dir = dir_with(&[("pic.png", b"abc")]);
        let (html, report) = rewrite(&dir, r#"<p><img alt="x" src="img/pic.png" width="3"></p>"#);
        assert_eq!(
            html,
            r#"<p><img alt="x" src="data:image/jpg;base64,YWJj" width="3"></p>"#
        );
        assert!(report.embedded_images.contains(&dir.path().join("pic.png")));
    }

    #[test]
    fn stylesheet_close_tag_is_escaped() {
        let dir = dir_with(&[("a.css", br#"p::after{content:"</style><b>pwn</b>"}"#)]);
        let (html, _) = rewrite(&dir, r#"<head><link rel="stylesheet" href="a.css"></head>"#);
        assert_eq!(
            html,
            "<head><style>\np::after{content:\"<\\/style><b>pwn</b>\"}\n</style></head>"
        );
        assert_eq!(html.matches("</style>").count(), 1);
    }

    #[test]
    fn existing_style_urls_are_embedded() {
        let dir = dir_with(&[("a.jpg", b"abc")]);
        let (html, report) = rewrite(
            &dir,
            "<head><style>b{background:url('img/a.jpg')}</style></head>",
        );
        assert_eq!(
            html,
            "<head><style>b{background:url('data:image/jpg;base64,YWJj')}</style></head>"
        );
        assert_eq!(report.css_urls_inlined, 1);
    }

    #[test]
    fn empty_comment_does_not_hide_stylesheet() {
        let dir = dir_with(&[("a.css", b"b{}")]);
        let (html, report) = rewrite(&dir, "<!--><link rel=stylesheet href=a.css><!-- x -->");
        assert_eq!(html, "<!--><style>\nb{}\n</style><!-- x -->");
        assert_eq!(report.stylesheets_inlined, 1);
    }

    #[test]
    fn inlined_body_script_moves_to_head() {
        let dir = dir_with(&[("app.js", b"run();")]);
        let (html, report) = rewrite(
            &dir,
            "<html><head></head><p>x</p><script src=app.js></script></html>",
        );
        assert_eq!(
            html,
            "<html><head><script>\nrun();\n</script></head><p>x</p></html>"
        );
        assert_eq!(report.scripts_inlined, 1);
        assert_eq!(report.moved_to_head, 1);
    }

    #[test]
    fn document_without_references_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let input = "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n<body>\n<p class=a>Hello &amp; bye</p>\n</body>\n</html>\n";
        let (html, report) = rewrite(&dir, input);
        assert_eq!(html, input);
        assert!(!report.changed());
    }
}
