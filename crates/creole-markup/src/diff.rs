//! Change markup between two formatted versions of a document.
//!
//! Both versions are split into start tag, end tag and text events and the
//! event sequences are compared. Text only in the old version is wrapped in
//! `<del>`, text only in the new one in `<ins>`, and a start tag standing in
//! for a different one gets [`REPLACED_CLASS`]. Replaced text is compared
//! word by word, each word carrying the whitespace before it.
//!
//! The tokenizer only understands formatter output: text never contains a raw
//! `<` and attribute values never contain `>`.

use std::fmt::Write;
use std::hash::Hash;
use std::ops::Range;

use similar::{Algorithm, DiffTag, capture_diff_slices};

/// Class added to a start tag that replaced a different one.
pub const REPLACED_CLASS: &str = "tagdiff_replaced";

/// Elements written without an end tag.
const VOID_TAGS: [&str; 3] = ["br", "hr", "img"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Event<'a> {
    /// Tag name and everything between it and `>`.
    Start { tag: &'a str, attrs: &'a str },
    End(&'a str),
    Text(&'a str),
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Ins,
    Del,
}

impl Mark {
    fn tag(self) -> &'static str {
        match self {
            Self::Ins => "ins",
            Self::Del => "del",
        }
    }
}

type Opcode = (DiffTag, Range<usize>, Range<usize>);

/// Merge formatted `old` and `new` HTML into one document with change markup.
pub(crate) fn diff_html(old: &str, new: &str) -> String {
    let old = events(old);
    let new = events(new);
    let mut writer = DiffWriter::default();
    for (tag, o, n) in opcodes(&old, &new) {
        match tag {
            DiffTag::Equal => writer.copy(&old[o], None),
            DiffTag::Delete => writer.copy(&old[o], Some(Mark::Del)),
            DiffTag::Insert => writer.copy(&new[n], Some(Mark::Ins)),
            DiffTag::Replace => writer.replace(&old[o], &new[n]),
        }
    }
    writer.finish()
}

/// Split formatter output into events. Void elements get a synthetic end.
fn events(html: &str) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut rest = html;
    while !rest.is_empty() {
        let Some(open) = rest.find('<') else {
            events.push(Event::Text(rest));
            break;
        };
        if open > 0 {
            events.push(Event::Text(&rest[..open]));
        }
        let tail = &rest[open..];
        let Some(close) = tail.find('>') else {
            events.push(Event::Text(tail));
            break;
        };
        let inner = &tail[1..close];
        rest = &tail[close + 1..];

        if let Some(tag) = inner.strip_prefix('/') {
            events.push(Event::End(tag));
            continue;
        }
        let name_end = inner
            .find(|c: char| c.is_ascii_whitespace() || c == '/')
            .unwrap_or(inner.len());
        let (tag, attrs) = inner.split_at(name_end);
        events.push(Event::Start { tag, attrs });
        if is_void(tag) {
            events.push(Event::End(tag));
        }
    }
    events
}

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Words of `text`, each with the whitespace that precedes it. Trailing
/// whitespace is a word of its own.
fn words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    let mut after_space = true;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if space && !after_space {
            words.push(&text[start..i]);
            start = i;
        }
        after_space = space;
    }
    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}

/// Diff two sequences, folding every run of deletions and insertions between
/// equal stretches into a single replacement.
fn opcodes<T: Hash + Eq + Ord>(old: &[T], new: &[T]) -> Vec<Opcode> {
    let mut ops: Vec<Opcode> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, o, n) = op.as_tag_tuple();
        match ops.last_mut() {
            Some((last, lo, ln)) if tag != DiffTag::Equal && *last != DiffTag::Equal => {
                lo.end = o.end;
                ln.end = n.end;
                *last = if lo.is_empty() {
                    DiffTag::Insert
                } else if ln.is_empty() {
                    DiffTag::Delete
                } else {
                    DiffTag::Replace
                };
            }
            _ => ops.push((tag, o, n)),
        }
    }
    ops
}

#[derive(Debug, Default)]
struct DiffWriter<'a> {
    out: String,
    open: Vec<&'a str>,
}

impl<'a> DiffWriter<'a> {
    /// Write `events` unchanged, marking non-blank text when `mark` is set.
    fn copy(&mut self, events: &[Event<'a>], mark: Option<Mark>) {
        for event in events {
            match *event {
                Event::Start { tag, attrs } => self.enter(tag, attrs),
                Event::End(tag) => {
                    self.leave(tag);
                }
                Event::Text(text) => match mark {
                    Some(mark) if !text.trim().is_empty() => self.mark(mark, text),
                    _ => self.out.push_str(text),
                },
            }
        }
    }

    /// Walk a replaced stretch pairwise.
    fn replace(&mut self, old: &[Event<'a>], new: &[Event<'a>]) {
        for i in 0..old.len().max(new.len()) {
            match (old.get(i), new.get(i)) {
                (Some(_), None) => {
                    self.copy(&old[i..], Some(Mark::Del));
                    break;
                }
                (None, Some(_)) => {
                    self.copy(&new[i..], Some(Mark::Ins));
                    break;
                }
                (Some(Event::Start { .. }), Some(&Event::Start { tag, attrs })) => {
                    self.enter_replaced(tag, attrs);
                }
                (Some(&Event::End(old_tag)), Some(&Event::End(new_tag))) => {
                    if !self.leave(new_tag) {
                        self.leave(old_tag);
                    }
                }
                (Some(Event::Text(old_text)), Some(Event::Text(new_text))) => {
                    self.diff_words(old_text, new_text);
                }
                (Some(Event::Text(old_text)), Some(event)) => {
                    self.mark(Mark::Del, old_text);
                    self.copy(std::slice::from_ref(event), None);
                }
                (Some(_), Some(Event::Text(new_text))) => self.mark(Mark::Ins, new_text),
                _ => {}
            }
        }
    }

    fn diff_words(&mut self, old: &str, new: &str) {
        let old = words(old);
        let new = words(new);
        for (tag, o, n) in opcodes(&old, &new) {
            match tag {
                DiffTag::Equal => self.out.push_str(&old[o].concat()),
                DiffTag::Delete => self.mark(Mark::Del, &old[o].concat()),
                DiffTag::Insert => self.mark(Mark::Ins, &new[n].concat()),
                DiffTag::Replace => {
                    self.mark(Mark::Del, &old[o].concat());
                    self.mark(Mark::Ins, &new[n].concat());
                }
            }
        }
    }

    /// Wrap `text` in `mark`, leaving its leading whitespace outside.
    fn mark(&mut self, mark: Mark, text: &str) {
        let body = text.trim_start();
        self.out.push_str(&text[..text.len() - body.len()]);
        if !body.is_empty() {
            let _ = write!(self.out, "<{0}>{body}</{0}>", mark.tag());
        }
    }

    fn enter(&mut self, tag: &'a str, attrs: &str) {
        let _ = write!(self.out, "<{tag}{attrs}>");
        if !is_void(tag) {
            self.open.push(tag);
        }
    }

    fn enter_replaced(&mut self, tag: &'a str, attrs: &str) {
        let (attrs, close) = attrs
            .strip_suffix('/')
            .map_or((attrs, ""), |attrs| (attrs, "/"));
        let _ = write!(self.out, r#"<{tag}{attrs} class="{REPLACED_CLASS}"{close}>"#);
        if !is_void(tag) {
            self.open.push(tag);
        }
    }

    /// Close `tag` if it is the innermost open element.
    fn leave(&mut self, tag: &str) -> bool {
        if is_void(tag) {
            return true;
        }
        if self.open.last() != Some(&tag) {
            return false;
        }
        self.open.pop();
        let _ = write!(self.out, "</{tag}>");
        true
    }

    /// Close whatever is still open.
    fn finish(mut self) -> String {
        while let Some(tag) = self.open.pop() {
            let _ = write!(self.out, "</{tag}>");
        }
        self.out
    }
}
