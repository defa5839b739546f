//! Link and image output.
//!
//! Link targets, labels and image attributes come from text that was escaped
//! on entry, so they are written into attributes and element content without
//! escaping them again.
//!
//! An `href` or `src` whose scheme is not `http`, `https`, `ftp` or `mailto`
//! is never written; the label or alt text is emitted as plain text instead.
//! Relative targets (no scheme before the first `/`, `?` or `#`) are kept.

use std::borrow::Cow;
use std::fmt::Write;

use crate::options::FormatOptions;

/// Flavour of a link rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Absolute URI (`http`, `https`, `ftp`, `mailto`), used verbatim.
    Uri,
    /// Wiki page name, passed through [`FormatOptions::link_format`].
    Wiki,
    /// `Name:Page` resolved through [`FormatOptions::interwiki`].
    Interwiki,
}

/// Remove `~` escape characters, keeping the escaped character.
///
/// A trailing lone `~` is kept.
pub(crate) fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('~') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('~'),
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Resolve the `href` for a link target.
pub(crate) fn href(kind: LinkKind, target: &str, options: &FormatOptions) -> String {
    match kind {
        LinkKind::Uri => target.to_owned(),
        LinkKind::Wiki => wiki_href(target, options),
        LinkKind::Interwiki => {
            interwiki_href(target, options).unwrap_or_else(|| wiki_href(target, options))
        }
    }
}

fn wiki_href(target: &str, options: &FormatOptions) -> String {
    let target = unescape(target);
    match &options.link_format {
        Some(format) => format.apply(&target),
        None => target.into_owned(),
    }
}

/// Interwiki target, or `None` when the prefix is not configured.
fn interwiki_href(target: &str, options: &FormatOptions) -> Option<String> {
    let (name, page) = target.split_once(':')?;
    let base = options.interwiki.get(name)?;
    Some(format!("{base}{}", unescape(page)))
}

/// Schemes a written URL may carry.
const SAFE_SCHEMES: [&str; 4] = ["http", "https", "ftp", "mailto"];

/// Whether `url` is relative or uses one of [`SAFE_SCHEMES`].
pub(crate) fn is_safe_url(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return true;
    };
    if scheme.contains(['/', '?', '#']) {
        return true;
    }
    let scheme = scheme.trim_matches(|c: char| c.is_ascii_whitespace() || c.is_ascii_control());
    SAFE_SCHEMES
        .iter()
        .any(|safe| scheme.eq_ignore_ascii_case(safe))
}

/// Write `<a href="href">label</a>`, or just the label when `href` is unsafe.
pub(crate) fn write_link(out: &mut String, href: &str, label: &str) {
    let label = unescape(label);
    if !is_safe_url(href) {
        tracing::debug!(href, "Dropped link with unsafe scheme");
        out.push_str(&label);
        return;
    }
    let _ = write!(out, r#"<a href="{href}">{label}</a>"#);
}

/// Write `<img src="src" alt="alt"/>`, or just the alt text when `src` is
/// unsafe.
pub(crate) fn write_image(out: &mut String, src: &str, alt: Option<&str>, options: &FormatOptions) {
    let alt = alt.map_or(Cow::Borrowed(options.default_image_text.as_str()), unescape);
    if !is_safe_url(src) {
        tracing::debug!(src, "Dropped image with unsafe scheme");
        out.push_str(&alt);
        return;
    }
    let _ = write!(out, r#"<img src="{src}" alt="{alt}"/>"#);
}
