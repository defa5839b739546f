//! HTML escaping of raw markup input.

/// Escape the HTML-significant characters `&`, `<`, `>` and `"`.
///
/// Ampersands are replaced first so that entities introduced by the later
/// substitutions are not escaped a second time. Single quotes are left alone.
///
/// Escaping is not idempotent: escaping `&amp;` yields `&amp;amp;`.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
