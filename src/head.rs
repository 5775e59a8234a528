//! Moving head-only elements out of `<body>`
//!
//! One streaming pass follows which elements are open, applying the implied
//! end tags an HTML parser would (`<div>` closes an open `<p>`, `<li>` closes
//! an open `<li>`, and so on). Every head-only element that ends up directly
//! in the body is bracketed with comment marks, and a mark is dropped where
//! the head ends. The bracketed source text is then spliced in at that
//! point, so moved elements keep their exact bytes.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element};
use log::debug;
use uuid::Uuid;

use crate::error::{InlineError, InlineResult};
use crate::rewriter::{RewriteReport, rewrite_error};

/// Elements that belong in `<head>` even when an upload puts them in `<body>`
pub const HEAD_ONLY_ELEMENTS: &[&str] = &["base", "meta", "title", "link", "style", "script"];

/// Elements a parser keeps inside `<head>`
const HEAD_CONTENT: &[&str] = &[
    "base", "meta", "title", "link", "style", "script", "noscript", "template",
];

/// Start tags that close an open `<p>`
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "listing", "main", "menu", "nav", "ol",
    "p", "plaintext", "pre", "section", "summary", "table", "ul", "xmp",
];

/// Open elements that stop the search for an element to close implicitly
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "th", "template",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
}

/// What to do with a start tag seen by [`HeadScan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAction {
    Keep,
    /// The head ends right before this element
    HeadEndsBefore,
    /// The element sits directly in the body; the number is its move order
    Misplaced(usize),
}

/// Tracks document structure from a stream of start and end tags
#[derive(Debug)]
pub struct HeadScan {
    phase: Phase,
    open: Vec<String>,
    head_end_marked: bool,
    wrap_head: bool,
    misplaced: usize,
}

impl Default for HeadScan {
    fn default() -> Self {
        Self {
            phase: Phase::BeforeHead,
            open: Vec::new(),
            head_end_marked: false,
            wrap_head: false,
            misplaced: 0,
        }
    }
}

impl HeadScan {
    /// Number of head-only elements found directly in the body
    #[must_use]
    pub fn misplaced(&self) -> usize {
        self.misplaced
    }

    /// Whether the document has no head at all, so moved elements need a
    /// `<head>` wrapper
    #[must_use]
    pub fn wraps_head(&self) -> bool {
        self.wrap_head
    }

    pub fn on_start(&mut self, name: &str, can_have_content: bool) -> StartAction {
        match (self.phase, name) {
            (_, "html") => StartAction::Keep,
            (Phase::BeforeHead, "head") => {
                self.phase = Phase::InHead;
                StartAction::Keep
            }
            (_, "head") => StartAction::Keep,
            (Phase::BeforeHead | Phase::InHead, "body") => {
                let action = self.end_head_here();
                self.enter_body();
                action
            }
            (Phase::BeforeHead | Phase::InHead, _)
                if !self.open.is_empty() || HEAD_CONTENT.contains(&name) =>
            {
                // Head content without a `<head>` tag opens an implied head
                self.phase = Phase::InHead;
                if can_have_content {
                    self.open.push(name.to_string());
                }
                StartAction::Keep
            }
            (Phase::BeforeHead | Phase::InHead, _) => {
                let action = self.end_head_here();
                self.enter_body();
                self.open_body_element(name, can_have_content);
                action
            }
            (Phase::AfterHead, "body") => {
                self.phase = Phase::InBody;
                StartAction::Keep
            }
            (Phase::InBody, "body") => StartAction::Keep,
            (_, _) if self.open.is_empty() && HEAD_ONLY_ELEMENTS.contains(&name) => {
                let order = self.misplaced;
                self.misplaced += 1;
                StartAction::Misplaced(order)
            }
            (_, _) => {
                self.phase = Phase::InBody;
                self.open_body_element(name, can_have_content);
                StartAction::Keep
            }
        }
    }

    /// Returns true when the head ends at this end tag
    pub fn on_end(&mut self, name: &str) -> bool {
        if name == "head" && matches!(self.phase, Phase::BeforeHead | Phase::InHead) {
            self.open.clear();
            self.phase = Phase::AfterHead;
            return self.end_head_here() == StartAction::HeadEndsBefore;
        }
        if let Some(at) = self.open.iter().rposition(|open| open == name) {
            self.open.truncate(at);
        }
        false
    }

    fn end_head_here(&mut self) -> StartAction {
        if self.head_end_marked {
            return StartAction::Keep;
        }
        self.head_end_marked = true;
        self.wrap_head = self.phase == Phase::BeforeHead;
        StartAction::HeadEndsBefore
    }

    fn enter_body(&mut self) {
        self.phase = Phase::InBody;
        self.open.clear();
    }

    fn open_body_element(&mut self, name: &str, can_have_content: bool) {
        match name {
            "li" => self.close_in_scope(&["li"], &["ol", "ul"]),
            "dd" | "dt" => self.close_in_scope(&["dd", "dt"], &["dl"]),
            _ => {}
        }
        if CLOSES_P.contains(&name) {
            self.close_in_scope(&["p"], &[]);
        }
        if can_have_content {
            self.open.push(name.to_string());
        }
    }

    fn close_in_scope(&mut self, targets: &[&str], boundaries: &[&str]) {
        for at in (0..self.open.len()).rev() {
            let open = self.open[at].as_str();
            if targets.contains(&open) {
                self.open.truncate(at);
                return;
            }
            if SCOPE_BOUNDARIES.contains(&open) || boundaries.contains(&open) {
                return;
            }
        }
    }
}

/// Comment marks unique to one repair
struct Marks {
    token: String,
}

impl Marks {
    fn new() -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
        }
    }

    fn head(&self) -> String {
        format!("<!--site-inliner:{}:head-->", self.token)
    }

    fn start(&self, order: usize) -> String {
        format!("<!--site-inliner:{}:start:{order}-->", self.token)
    }

    fn end(&self, order: usize) -> String {
        format!("<!--site-inliner:{}:end:{order}-->", self.token)
    }
}

/// Move head-only elements that are direct children of `<body>` to the end of `<head>`
///
/// A `<head>` is written where the head would start if the document has
/// none. Documents with nothing to move come back unchanged.
pub fn repair_head(html: &str, report: &mut RewriteReport) -> InlineResult<String> {
    let marks = Marks::new();
    let scan = Rc::new(RefCell::new(HeadScan::default()));
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let name = el.tag_name();
                let action = scan.borrow_mut().on_start(&name, el.can_have_content());
                match action {
                    StartAction::Keep => {}
                    StartAction::HeadEndsBefore => el.before(&marks.head(), ContentType::Html),
                    StartAction::Misplaced(order) => {
                        el.before(&marks.start(order), ContentType::Html);
                        el.after(&marks.end(order), ContentType::Html);
                    }
                }

                if let Some(handlers) = el.end_tag_handlers() {
                    let scan = Rc::clone(&scan);
                    let head_mark = marks.head();
                    let handler: lol_html::EndTagHandler<'static> = Box::new(move |end| {
                        if scan.borrow_mut().on_end(&name) {
                            end.before(&head_mark, ContentType::Html);
                        }
                        Ok(())
                    });
                    handlers.push(handler);
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter.write(html.as_bytes()).map_err(rewrite_error)?;
    rewriter.end().map_err(rewrite_error)?;

    let marked = String::from_utf8(output).map_err(|e| InlineError::Markup(e.to_string()))?;
    let (misplaced, wrap_head) = {
        let scan = scan.borrow();
        (scan.misplaced(), scan.wraps_head())
    };
    let (repaired, moved) = splice(&marked, &marks, misplaced, wrap_head);
    if moved > 0 {
        debug!(target: "site_inliner::head", "Moved {moved} elements from body to head");
    }
    report.moved_to_head += moved;
    Ok(repaired)
}

/// Cut every bracketed element and insert them, in order, at the head mark
fn splice(marked: &str, marks: &Marks, misplaced: usize, wrap_head: bool) -> (String, usize) {
    let mut html = marked.to_string();
    let head_mark = marks.head();
    let can_move = html.contains(&head_mark);

    let mut moved = String::new();
    let mut count = 0;
    for order in 0..misplaced {
        let (start, end) = (marks.start(order), marks.end(order));
        let Some(from) = html.find(&start) else {
            continue;
        };
        match html[from..].find(&end).map(|at| from + at) {
            Some(to) if can_move => {
                moved.push_str(&html[from + start.len()..to]);
                html.replace_range(from..to + end.len(), "");
                count += 1;
            }
            Some(to) => {
                html.replace_range(to..to + end.len(), "");
                html.replace_range(from..from + start.len(), "");
            }
            // Unclosed element: stays where it is
            None => html.replace_range(from..from + start.len(), ""),
        }
    }

    if let Some(at) = html.find(&head_mark) {
        let insert = match (count, wrap_head) {
            (0, _) => String::new(),
            (_, true) => format!("<head>{moved}</head>"),
            (_, false) => moved,
        };
        html.replace_range(at..at + head_mark.len(), &insert);
    }
    (html, count)
}
