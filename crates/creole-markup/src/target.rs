//! Presentation targets that receive formatted HTML.

use std::fmt;

/// Anything whose content can be replaced with an HTML string, such as a node
/// in the caller's document tree.
pub trait MarkupTarget {
    /// Replace the target's content with `html`.
    fn set_inner_html(&mut self, html: String);
}

impl MarkupTarget for String {
    fn set_inner_html(&mut self, html: String) {
        *self = html;
    }
}

/// Minimal HTML element: a tag name and its inner HTML.
///
/// Renders as `<tag>inner_html</tag>` through [`Display`](fmt::Display).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name, written without validation.
    pub tag: String,
    /// Content, already HTML.
    pub inner_html: String,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            inner_html: String::new(),
        }
    }
}

impl MarkupTarget for Element {
    fn set_inner_html(&mut self, html: String) {
        self.inner_html = html;
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{tag}>{}</{tag}>", self.inner_html, tag = self.tag)
    }
}
