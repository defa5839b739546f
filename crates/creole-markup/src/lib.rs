//! Creole wiki markup to HTML.
//!
//! The engine is a tree of ordered [`Rule`]s. Each rule pairs a pattern with a
//! transform and a list of child rules that format the text it captured. At
//! every position the leftmost child match wins, ties going to the child
//! declared first; text between matches is handed to a fallback rule or copied
//! through unchanged.
//!
//! Input is HTML-escaped once on entry, so everything the engine copies
//! through is safe to embed and no rule ever emits raw user markup.
//!
//! # Architecture
//!
//! - [`escape_html`]: entry escaping
//! - [`Pattern`] and [`MatchRecord`]: matching and captured groups
//! - [`RuleSet`]: rule arena and the matching algorithm
//! - [`Grammar`]: the Creole rule tree
//! - [`Formatter`]: grammar plus [`FormatOptions`]
//! - [`format_diff`]: change markup between two versions of a document
//!
//! # Example
//!
//! ```
//! use creole_markup::{FormatOptions, Formatter, LinkFormat};
//!
//! assert_eq!(creole_markup::format("= Title ="), "<h1>Title</h1>");
//!
//! let formatter = Formatter::new(
//!     FormatOptions::default().with_link_format(LinkFormat::new("/wiki/", "")),
//! );
//! assert_eq!(
//!     formatter.format("[[Home]]"),
//!     r#"<p><a href="/wiki/Home">Home</a></p>"#
//! );
//! ```

mod diff;
mod escape;
mod grammar;
mod links;
mod options;
mod pattern;
mod rule;
mod target;

pub use diff::REPLACED_CLASS;
pub use escape::escape_html;
pub use grammar::Grammar;
pub use links::LinkKind;
pub use options::{FormatOptions, LinkFormat};
pub use pattern::{MatchRecord, Pattern, Reject};
pub use rule::{Rewrite, Rule, RuleId, RuleSet, RuleSetBuilder, Transform};
pub use target::{Element, MarkupTarget};

/// Format a Creole document with default options.
#[must_use]
pub fn format(text: &str) -> String {
    Formatter::default().format(text)
}

/// Format inline Creole text (no paragraphs or block constructs) with default
/// options.
#[must_use]
pub fn format_inline(text: &str) -> String {
    Formatter::default().format_inline(text)
}

/// Format two versions of a document with default options and mark what
/// changed between them. See [`Formatter::format_diff`].
#[must_use]
pub fn format_diff(old: &str, new: &str) -> String {
    Formatter::default().format_diff(old, new)
}

/// Format `text` with default options and store the result in `target`.
pub fn parse<T: MarkupTarget + ?Sized>(target: &mut T, text: &str) {
    target.set_inner_html(format(text));
}

/// Creole formatter: the shared grammar plus per-formatter options.
///
/// Cheap to create; the grammar is compiled once per process and shared.
#[derive(Debug, Clone)]
pub struct Formatter {
    grammar: &'static Grammar,
    options: FormatOptions,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(FormatOptions::default())
    }
}

impl Formatter {
    /// Create a formatter with the given options.
    #[must_use]
    pub fn new(options: FormatOptions) -> Self {
        Self {
            grammar: Grammar::shared(),
            options,
        }
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Format a whole document: headings, lists, tables, preformatted blocks
    /// and paragraphs.
    #[must_use]
    pub fn format(&self, text: &str) -> String {
        self.run(self.grammar.document(), text)
    }

    /// Format inline text only.
    #[must_use]
    pub fn format_inline(&self, text: &str) -> String {
        self.run(self.grammar.inline(), text)
    }

    /// Format both versions of a document and merge them into one, with
    /// removed text in `<del>`, added text in `<ins>` and replaced start tags
    /// carrying [`REPLACED_CLASS`].
    #[must_use]
    pub fn format_diff(&self, old: &str, new: &str) -> String {
        let html = diff::diff_html(&self.format(old), &self.format(new));
        tracing::trace!(
            old = old.len(),
            new = new.len(),
            output = html.len(),
            "Formatted diff"
        );
        html
    }

    /// Format a document and store the result in `target`.
    pub fn parse<T: MarkupTarget + ?Sized>(&self, target: &mut T, text: &str) {
        target.set_inner_html(self.format(text));
    }

    fn run(&self, root: RuleId, text: &str) -> String {
        let escaped = escape_html(text);
        let mut out = String::with_capacity(escaped.len() + escaped.len() / 4);
        self.grammar
            .rules()
            .apply(root, &escaped, &self.options, &mut out);
        tracing::trace!(input = text.len(), output = out.len(), "Formatted creole");
        out
    }
}
