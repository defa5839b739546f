//! The Creole rule tree.
//!
//! Block rules are tried against whole documents, inline rules against the
//! text inside blocks. Patterns are written for the `regex` crate, which has
//! no look-around: where classic Creole grammars use `](?!])`, the patterns
//! here consume the following character instead (`][^\]]`), and the one
//! look-behind constraint (emphasis must not open inside `http://`) is a
//! [`Pattern::Guarded`] rejection predicate. Inside emphasis, URIs and bare
//! schemes are consumed whole so their `//` never closes it.
//!
//! All patterns run in linear time. Formatting a document is still
//! super-linear for inputs with many overlapping candidates, since every
//! consumed match can force a rescan of the tail; callers exposed to
//! untrusted input should bound its size.

use std::sync::LazyLock;

use regex::Regex;

use crate::links::LinkKind;
use crate::pattern::Pattern;
use crate::rule::{Rewrite, RuleId, RuleSet, RuleSetBuilder, Transform};

/// Scheme prefixes that make a bare URI.
const URI_PREFIX: &str = r"\b(?:(?:https?|ftp)://|mailto:)";
/// URI scheme and separator alone, with nothing linkable after it.
const URI_SCHEME: &str = r"\b(?:https?|ftp)://";
/// Rest of a bare URI. Entities other than `&amp;` end it, and it never ends
/// in punctuation.
const URI_TAIL: &str = r#"(?:[^\s&]|&amp;)*[^\s!"',.:;?&]"#;
/// Link target inside `[[...]]`: no `|`, no `]]`, `~` escapes.
const LINK: &str = r"(?:[^\]|~\n]|~.|\](?:[^\]|~\n]|~.))*";
/// Link label inside `[[...|...]]`: no `]]`, `~` escapes.
const LINK_TEXT: &str = r"(?:[^\]~\n]|~.|\](?:[^\]~\n]|~.))*";
/// Interwiki name and separator.
const INTERWIKI: &str = r"[\w.]+:";
/// Image source inside `{{...}}`: does not start with `{`, no `|`, no `}}`.
const IMAGE_SRC: &str = r"(?:[^{|}\n](?:[^|}\n]|\}[^|}\n])*)?";
/// Image alt text: no `}}`, `~` escapes.
const IMAGE_ALT: &str = r"(?:[^}~\n]|~.|\}[^}~\n]|\}~.)*";

/// List marker stripped from each line of a list item.
const LIST_MARKER: &str = r"(?m)^[ \t]*[*#][ \t]*";

static CREOLE: LazyLock<Grammar> = LazyLock::new(Grammar::creole);

/// Compiled Creole grammar: the rule arena plus its two entry points.
#[derive(Debug)]
pub struct Grammar {
    rules: RuleSet,
    document: RuleId,
    inline: RuleId,
}

impl Grammar {
    /// Process-wide Creole grammar, compiled on first use.
    #[must_use]
    pub fn shared() -> &'static Self {
        &CREOLE
    }

    /// All rules.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Root rule for whole documents.
    #[must_use]
    pub fn document(&self) -> RuleId {
        self.document
    }

    /// Root rule for inline text: no blocks, no paragraphs.
    #[must_use]
    pub fn inline(&self) -> RuleId {
        self.inline
    }

    /// Build the Creole rule tree.
    ///
    /// # Panics
    ///
    /// Panics if a pattern fails to compile or a rule is defective.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn creole() -> Self {
        let mut b = RuleSetBuilder::new();

        // Inline rules.
        let escape = b.rule(
            "escape",
            pattern(&["~(", URI_PREFIX, URI_TAIL, "|.)"]),
            Transform::Escaped { capture: 1 },
        );
        let strong = b.rule(
            "strong",
            pattern(&[r"\*\*((?:[^*~]|~.?|\*(?:[^*~]|~.?))*)(?:\*\*|\*?$)"]),
            element("strong", 1),
        );
        let em = b.rule(
            "em",
            Pattern::Guarded {
                regex: compile(&[
                    "//((?:",
                    URI_PREFIX,
                    URI_TAIL,
                    "|",
                    URI_SCHEME,
                    r"|~.?|/(?:[^/~]|~.?)|[^/~])*)(?://|/?$)",
                ]),
                reject: follows_uri_scheme,
            },
            element("em", 1),
        );
        let br = b.rule("br", pattern(&[r"\\\\"]), Transform::Void { tag: "br" });
        let raw_uri = b.rule(
            "raw_uri",
            pattern(&["(", URI_PREFIX, URI_TAIL, ")"]),
            Transform::Link(LinkKind::Uri),
        );
        let named_uri = b.rule(
            "named_uri",
            pattern(&[r"\[\[(", URI_PREFIX, LINK, r")\|(", LINK_TEXT, r")\]\]"]),
            Transform::Link(LinkKind::Uri),
        );
        let named_interwiki = b.rule(
            "named_interwiki",
            pattern(&[r"\[\[(", INTERWIKI, LINK, r")\|(", LINK_TEXT, r")\]\]"]),
            Transform::Link(LinkKind::Interwiki),
        );
        let named_link = b.rule(
            "named_link",
            pattern(&[r"\[\[(", LINK, r")\|(", LINK_TEXT, r")\]\]"]),
            Transform::Link(LinkKind::Wiki),
        );
        let unnamed_uri = b.rule(
            "unnamed_uri",
            pattern(&[r"\[\[(", URI_PREFIX, LINK, r")\]\]"]),
            Transform::Link(LinkKind::Uri),
        );
        let unnamed_interwiki = b.rule(
            "unnamed_interwiki",
            pattern(&[r"\[\[(", INTERWIKI, LINK, r")\]\]"]),
            Transform::Link(LinkKind::Interwiki),
        );
        let unnamed_link = b.rule(
            "unnamed_link",
            pattern(&[r"\[\[(", LINK, r")\]\]"]),
            Transform::Link(LinkKind::Wiki),
        );
        let tt = b.rule(
            "tt",
            pattern(&[r"\{\{\{(.*?\}*)\}\}\}"]),
            element("tt", 1),
        );
        let image = b.rule(
            "image",
            pattern(&[r"\{\{(", IMAGE_SRC, r")(?:\|(", IMAGE_ALT, r"))?\}\}"]),
            Transform::Image,
        );
        let inline_rules = [
            escape,
            strong,
            em,
            br,
            raw_uri,
            named_uri,
            named_interwiki,
            named_link,
            unnamed_uri,
            unnamed_interwiki,
            unnamed_link,
            tt,
            image,
        ];
        let inline = b.container("inline");

        // Block rules.
        let headings: Vec<RuleId> = ["h1", "h2", "h3", "h4", "h5", "h6"]
            .into_iter()
            .enumerate()
            .map(|(level, tag)| {
                let marker = "=".repeat(level + 1);
                b.rule(
                    tag,
                    pattern(&[
                        r"(?:^|\n)[ \t]*",
                        marker.as_str(),
                        r"[ \t]((?:[^~\n]|~.?)*?)[ \t]*=*\s*(?:\n|$)",
                    ]),
                    Transform::Element {
                        tag,
                        capture: 1,
                        skip_empty: true,
                    },
                )
            })
            .collect();
        let hr = b.rule(
            "hr",
            pattern(&[r"(?:^|\n)[ \t]*----[ \t]*(?:\n|$)"]),
            Transform::Void { tag: "hr" },
        );
        let ulist = b.rule("ulist", pattern(&[list_block(r"\*").as_str()]), element("ul", 1));
        let olist = b.rule("olist", pattern(&[list_block("#").as_str()]), element("ol", 1));
        let ul_item = b.rule("ul_item", pattern(&[list_item(r"\*").as_str()]), element("li", 1));
        let ol_item = b.rule("ol_item", pattern(&[list_item("#").as_str()]), element("li", 1));
        let pre = b.rule(
            "pre",
            pattern(&[r"(?:^|\n)\{\{\{\n((?:.*\n)*?)\}\}\}(?:\n|$)"]),
            Transform::Verbatim {
                tag: "pre",
                capture: 1,
            },
        );
        let table = b.rule(
            "table",
            pattern(&[r"(?:^|\n)(\|.*(?:\n\|.*)*)(?:\n|$)"]),
            element("table", 1),
        );
        let tr = b.rule(
            "tr",
            pattern(&[r"(?:^|\n)(\|.*?)\|?[ \t]*(?:\n|$)"]),
            element("tr", 1),
        );
        let th = b.rule("th", pattern(&[r"\|+=([^|]*)"]), element("th", 1));
        let td = b.rule(
            "td",
            pattern(&[
                r"\|+((?:[^|~\[{]|~.?|\[\[",
                LINK,
                r"(?:\|",
                LINK_TEXT,
                r")?\]\]|\{\{",
                IMAGE_SRC,
                r"(?:\|",
                IMAGE_ALT,
                r")?\}\}|[\[{])*)",
            ]),
            element("td", 1),
        );
        let paragraph = b.rule(
            "paragraph",
            pattern(&[r"(?:^|\n)([ \t]*\S.*(?:\n[ \t]*\S.*)*)(?:\n|$)"]),
            element("p", 1),
        );
        let blocks = b.container("blocks");
        let document = b.container("document");

        // Wiring.
        for &id in headings
            .iter()
            .chain(&[paragraph, inline, strong, em, tt, th, td])
        {
            b.children(id, &inline_rules);
        }
        b.children(ulist, &[ul_item])
            .children(olist, &[ol_item])
            .children(table, &[tr])
            .children(tr, &[th, td])
            .children(blocks, &[paragraph]);
        for item in [ul_item, ol_item] {
            b.children(item, &[ulist, olist])
                .fallback(item, inline)
                .rewrite(item, Rewrite::new(compile(&[LIST_MARKER]), ""));
        }
        b.rewrite(
            pre,
            Rewrite::new(compile(&[r"(?m)^ ([ \t]*\}\}\})"]), "${1}"),
        );

        let mut roots = headings;
        roots.extend([hr, ulist, olist, pre, table]);
        b.children(document, &roots).fallback(document, blocks);

        let rules = b.build();
        tracing::debug!(rules = rules.len(), "Compiled creole grammar");

        Self {
            rules,
            document,
            inline,
        }
    }
}

/// Consecutive lines of a list whose top-level marker is `marker`.
///
/// A list starts with an item line, and each item may be followed by
/// continuation lines and then by deeper-nested item lines.
fn list_block(marker: &str) -> String {
    let item = format!(r"[ \t]*{marker}[^*#\n].*");
    let continuation = r"[ \t]*[^\s*#].*";
    let nested = r"[ \t]*[*#]{2}.*";
    let entry = format!(r"{item}(?:\n{continuation})*(?:\n{nested})*");
    format!(r"(?:^|\n)({entry}(?:\n{entry})*)(?:\n|$)")
}

/// One list item with its continuation lines and nested items.
fn list_item(marker: &str) -> String {
    format!(r"(?:^|\n)([ \t]*{marker}.+(?:\n[ \t]*[^*#\s].*)*(?:\n[ \t]*{marker}[*#].+)*)")
}

fn element(tag: &'static str, capture: usize) -> Transform {
    Transform::Element {
        tag,
        capture,
        skip_empty: false,
    }
}

fn pattern(parts: &[&str]) -> Pattern {
    Pattern::Regex(compile(parts))
}

fn compile(parts: &[&str]) -> Regex {
    let source = parts.concat();
    Regex::new(&source).unwrap_or_else(|e| panic!("invalid grammar pattern {source:?}: {e}"))
}

/// Whether `start` directly follows `http:`, `https:` or `ftp:`.
fn follows_uri_scheme(text: &str, start: usize) -> bool {
    let before = &text.as_bytes()[..start];
    ["http:", "https:", "ftp:"].iter().any(|scheme| {
        before.len() >= scheme.len()
            && before[before.len() - scheme.len()..].eq_ignore_ascii_case(scheme.as_bytes())
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{FormatOptions, Formatter, LinkFormat};

    fn html(text: &str) -> String {
        Formatter::default().format(text)
    }

    fn inline(text: &str) -> String {
        Formatter::default().format_inline(text)
    }

    #[test]
    fn test_grammar_builds() {
        let grammar = Grammar::creole();
        let rules = grammar.rules();
        for name in ["document", "blocks", "inline", "h1", "h6", "paragraph", "em"] {
            assert!(rules.find(name).is_some(), "missing rule {name}");
        }
        assert_eq!(rules.rule(grammar.document()).children().len(), 11);
        assert_eq!(rules.rule(grammar.inline()).children().len(), 13);
    }

    #[test]
    fn test_inline_rules_are_shared() {
        let grammar = Grammar::creole();
        let rules = grammar.rules();
        let strong = rules.find("strong").unwrap();
        let paragraph = rules.find("paragraph").unwrap();
        assert_eq!(
            rules.rule(strong).children(),
            rules.rule(paragraph).children()
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(html("= Title ="), "<h1>Title</h1>");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(html("== Two =="), "<h2>Two</h2>");
        assert_eq!(html("=== Three"), "<h3>Three</h3>");
        assert_eq!(html("====== Six ======"), "<h6>Six</h6>");
    }

    #[test]
    fn test_heading_with_inline_markup() {
        assert_eq!(html("= A **b** ="), "<h1>A <strong>b</strong></h1>");
    }

    #[test]
    fn test_empty_heading_emits_nothing() {
        assert_eq!(html("= ="), "");
    }

    #[test]
    fn test_heading_needs_space_after_marker() {
        assert_eq!(html("=Title"), "<p>=Title</p>");
    }

    #[test]
    fn test_horizontal_rule_then_heading() {
        assert_eq!(html("----\n= H ="), "<hr><h1>H</h1>");
    }

    #[test]
    fn test_heading_then_paragraph() {
        assert_eq!(html("= H =\ntext"), "<h1>H</h1><p>text</p>");
    }

    #[test]
    fn test_paragraph_does_not_swallow_heading() {
        assert_eq!(html("text\n= H ="), "<p>text</p><h1>H</h1>");
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        assert_eq!(
            html("one\ntwo\n\nthree"),
            "<p>one\ntwo</p><p>three</p>"
        );
    }

    #[test]
    fn test_plain_text_is_one_paragraph() {
        assert_eq!(html("just text"), "<p>just text</p>");
    }

    #[test]
    fn test_bold_italic_nesting() {
        assert_eq!(
            html("**//x//**"),
            "<p><strong><em>x</em></strong></p>"
        );
    }

    #[test]
    fn test_unterminated_emphasis_runs_to_end() {
        assert_eq!(html("//open"), "<p><em>open</em></p>");
        assert_eq!(html("**open"), "<p><strong>open</strong></p>");
    }

    #[test]
    fn test_line_break() {
        assert_eq!(html(r"a\\b"), "<p>a<br>b</p>");
    }

    #[test]
    fn test_named_uri_link() {
        assert_eq!(
            html("[[http://example.com|Example]]"),
            r#"<p><a href="http://example.com">Example</a></p>"#
        );
    }

    #[test]
    fn test_unnamed_uri_link() {
        assert_eq!(
            html("[[http://example.com]]"),
            r#"<p><a href="http://example.com">http://example.com</a></p>"#
        );
    }

    #[test]
    fn test_wiki_links_use_link_format() {
        let formatter = Formatter::new(
            FormatOptions::default().with_link_format(LinkFormat::new("/wiki/", "")),
        );
        assert_eq!(
            formatter.format("[[Home]]"),
            r#"<p><a href="/wiki/Home">Home</a></p>"#
        );
        assert_eq!(
            formatter.format("[[Home|Go home]]"),
            r#"<p><a href="/wiki/Home">Go home</a></p>"#
        );
    }

    #[test]
    fn test_link_label_is_not_formatted() {
        assert_eq!(
            html("[[Page|**label**]]"),
            r#"<p><a href="Page">**label**</a></p>"#
        );
    }

    #[test]
    fn test_interwiki_link() {
        let formatter = Formatter::new(
            FormatOptions::default().with_interwiki("WikiPedia", "https://en.wikipedia.org/wiki/"),
        );
        assert_eq!(
            formatter.format("[[WikiPedia:Rust]]"),
            r#"<p><a href="https://en.wikipedia.org/wiki/Rust">WikiPedia:Rust</a></p>"#
        );
        assert_eq!(
            formatter.format("[[WikiPedia:Rust|the language]]"),
            r#"<p><a href="https://en.wikipedia.org/wiki/Rust">the language</a></p>"#
        );
    }

    #[test]
    fn test_bare_url_is_linked() {
        assert_eq!(
            html("visit http://example.com today"),
            r#"<p>visit <a href="http://example.com">http://example.com</a> today</p>"#
        );
    }

    #[test]
    fn test_bare_url_excludes_trailing_punctuation() {
        assert_eq!(
            html("see http://example.com."),
            r#"<p>see <a href="http://example.com">http://example.com</a>.</p>"#
        );
    }

    #[test]
    fn test_url_scheme_is_not_emphasis() {
        assert_eq!(html("see http:// here"), "<p>see http:// here</p>");
        assert_eq!(html("try ftp:// later"), "<p>try ftp:// later</p>");
    }

    #[test]
    fn test_url_inside_emphasis_does_not_close_it() {
        assert_eq!(
            html("//go to http://a.com now// done"),
            r#"<p><em>go to <a href="http://a.com">http://a.com</a> now</em> done</p>"#
        );
    }

    #[test]
    fn test_bare_scheme_inside_emphasis_does_not_close_it() {
        assert_eq!(
            html("//visit http:// or ftp:// later//"),
            "<p><em>visit http:// or ftp:// later</em></p>"
        );
        assert_eq!(
            html("//see https:// here"),
            "<p><em>see https:// here</em></p>"
        );
    }

    #[test]
    fn test_unsafe_link_targets_are_dropped() {
        assert_eq!(html("[[javascript:alert(1)|x]]"), "<p>x</p>");
        assert_eq!(
            html("[[javascript:alert(1)]]"),
            "<p>javascript:alert(1)</p>"
        );
        assert_eq!(html("[[JavaScript:alert(1)|x]]"), "<p>x</p>");
        assert_eq!(html("[[ javascript:alert(1)|x]]"), "<p>x</p>");
    }

    #[test]
    fn test_unsafe_image_sources_are_dropped() {
        assert_eq!(html("{{javascript:alert(1)|x}}"), "<p>x</p>");
        assert_eq!(html("{{data:text/html,x|pic}}"), "<p>pic</p>");
    }

    #[test]
    fn test_link_format_keeps_scheme_like_targets_relative() {
        let prefixed = Formatter::new(
            FormatOptions::default().with_link_format(LinkFormat::new("/wiki/", "")),
        );
        assert_eq!(
            prefixed.format("[[javascript:alert(1)|x]]"),
            r#"<p><a href="/wiki/javascript:alert(1)">x</a></p>"#
        );

        let suffixed = Formatter::new(
            FormatOptions::default().with_link_format(LinkFormat::new("", ".html")),
        );
        assert_eq!(suffixed.format("[[javascript:alert(1)|x]]"), "<p>x</p>");
    }

    #[test]
    fn test_escape_character() {
        assert_eq!(html("~**not bold~**"), "<p>**not bold**</p>");
        assert_eq!(html("~http://example.com"), "<p>http://example.com</p>");
        assert_eq!(html("a ~"), "<p>a ~</p>");
    }

    #[test]
    fn test_inline_code_keeps_inline_rules() {
        assert_eq!(
            html("{{{**x**}}}"),
            "<p><tt><strong>x</strong></tt></p>"
        );
    }

    #[test]
    fn test_inline_code_trailing_braces() {
        assert_eq!(html("{{{a}}}}"), "<p><tt>a}</tt></p>");
    }

    #[test]
    fn test_preformatted_block_is_verbatim() {
        assert_eq!(html("{{{\n**raw**\n}}}"), "<pre>**raw**</pre>");
    }

    #[test]
    fn test_preformatted_block_unindents_closing_braces() {
        assert_eq!(
            html("{{{\nif x {\n }}}\n}}}"),
            "<pre>if x {\n}}}</pre>"
        );
    }

    #[test]
    fn test_unterminated_preformatted_block_is_paragraph() {
        assert_eq!(html("{{{\ncode"), "<p>{{{\ncode</p>");
    }

    #[test]
    fn test_unordered_list() {
        assert_eq!(html("* a\n* b"), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(
            html("* a\n** b\n* c"),
            "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"
        );
    }

    #[test]
    fn test_ordered_list_with_unordered_sublist() {
        assert_eq!(html("# one\n# two"), "<ol><li>one</li><li>two</li></ol>");
        assert_eq!(
            html("# one\n#* sub"),
            "<ol><li>one<ul><li>sub</li></ul></li></ol>"
        );
    }

    #[test]
    fn test_list_item_inline_markup() {
        assert_eq!(
            html("* **b** c"),
            "<ul><li><strong>b</strong> c</li></ul>"
        );
    }

    #[test]
    fn test_bold_at_line_start_is_not_a_list() {
        assert_eq!(html("**b** c"), "<p><strong>b</strong> c</p>");
    }

    #[test]
    fn test_table() {
        assert_eq!(
            html("|=A|=B|\n|1|2|"),
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>"
        );
    }

    #[test]
    fn test_table_cell_link_with_pipe() {
        assert_eq!(
            html("|[[a|b]]|c|"),
            r#"<table><tr><td><a href="a">b</a></td><td>c</td></tr></table>"#
        );
    }

    #[test]
    fn test_image() {
        assert_eq!(
            html("{{pic.png|A picture}}"),
            r#"<p><img src="pic.png" alt="A picture"/></p>"#
        );
        let formatter =
            Formatter::new(FormatOptions::default().with_default_image_text("image"));
        assert_eq!(
            formatter.format("{{pic.png}}"),
            r#"<p><img src="pic.png" alt="image"/></p>"#
        );
    }

    #[test]
    fn test_html_is_escaped() {
        assert_eq!(html("<script>"), "<p>&lt;script&gt;</p>");
        assert_eq!(html("{{{\n<b>\n}}}"), "<pre>&lt;b&gt;</pre>");
    }

    #[test]
    fn test_attribute_values_stay_quoted() {
        assert_eq!(
            html(r#"[[http://x.com/"onmouseover|x]]"#),
            r#"<p><a href="http://x.com/&quot;onmouseover">x</a></p>"#
        );
    }

    #[test]
    fn test_inline_context_has_no_blocks() {
        assert_eq!(inline("**a** b"), "<strong>a</strong> b");
        assert_eq!(inline("= not a heading"), "= not a heading");
    }

    #[test]
    fn test_malformed_input_never_panics() {
        let samples = [
            "", "[[", "]]", "{{", "}}", "{{{", "}}}", "**", "//", "~", "|", "||", "* ", "#",
            "=", "\n\n\n", "----", "[[|]]", "{{|}}", "|=", "~~~", "http://", "héllo **wörld",
            "* a\n## b\ncont", "|a\n* b\n= c\n{{{\nx",
        ];
        for sample in samples {
            let _ = html(sample);
            let _ = inline(sample);
        }
    }

    #[test]
    fn test_follows_uri_scheme() {
        assert!(follows_uri_scheme("http://", 5));
        assert!(follows_uri_scheme("HTTPS://", 6));
        assert!(follows_uri_scheme("ftp://", 4));
        assert!(!follows_uri_scheme("a //", 2));
        assert!(!follows_uri_scheme("é//", 2));
    }
}
