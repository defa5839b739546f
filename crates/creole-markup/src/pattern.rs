//! Text patterns and the match records they produce.
//!
//! Every rule in the grammar owns a [`Pattern`]. Patterns are plain `regex`
//! expressions (linear-time, no look-around), optionally combined with a
//! rejection predicate that vetoes individual candidate matches. The predicate
//! is how the grammar expresses constraints that classic Creole parsers write
//! as negative look-behind, such as "`//` preceded by `http:` is not emphasis".

use std::ops::Range;

use regex::{Captures, Regex};

/// Predicate deciding whether a candidate match starting at `start` in `text`
/// must be skipped.
pub type Reject = fn(text: &str, start: usize) -> bool;

/// Result of applying a pattern to a span of text.
///
/// Capture groups are stored relative to [`start`](Self::start). When the
/// matching loop consumes text in front of a cached record, shifting the record
/// only requires adjusting `start`; the groups stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// Byte offset of the match within the text it was found in.
    pub start: usize,
    /// Length of the whole match in bytes.
    pub len: usize,
    groups: Vec<Option<Range<usize>>>,
}

impl MatchRecord {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let groups = caps
            .iter()
            .map(|group| group.map(|m| m.start() - whole.start..m.end() - whole.start))
            .collect();
        Self {
            start: whole.start,
            len: whole.len(),
            groups,
        }
    }

    /// Offset one past the last matched byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Number of capture groups, including the implicit whole-match group 0.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Text of capture group `index`, resolved against the text the record
    /// was produced from (after any shifting).
    ///
    /// Returns `None` when the group does not exist or did not participate.
    #[must_use]
    pub fn group<'t>(&self, text: &'t str, index: usize) -> Option<&'t str> {
        let range = self.groups.get(index)?.as_ref()?;
        text.get(self.start + range.start..self.start + range.end)
    }

    /// Move the record `consumed` bytes to the left, after that many bytes
    /// were cut from the front of its text.
    pub(crate) fn shift(&mut self, consumed: usize) {
        self.start -= consumed;
    }
}

/// Matchable text pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain regular expression; the leftmost match wins.
    Regex(Regex),
    /// Regular expression whose candidate matches are filtered by a
    /// rejection predicate. Scanning resumes one character after a rejected
    /// candidate's start.
    Guarded {
        /// Candidate expression.
        regex: Regex,
        /// Veto applied to each candidate's start offset.
        reject: Reject,
    },
}

impl Pattern {
    /// Underlying regular expression.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        match self {
            Self::Regex(regex) | Self::Guarded { regex, .. } => regex,
        }
    }

    /// Find the leftmost acceptable match in `text`.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<MatchRecord> {
        match self {
            Self::Regex(regex) => regex.captures(text).map(|c| MatchRecord::from_captures(&c)),
            Self::Guarded { regex, reject } => {
                let mut from = 0;
                while from <= text.len() {
                    let caps = regex.captures_at(text, from)?;
                    let record = MatchRecord::from_captures(&caps);
                    if !reject(text, record.start) {
                        return Some(record);
                    }
                    from = next_char_boundary(text, record.start);
                }
                None
            }
        }
    }
}

/// Offset of the character following the one at `at`.
fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| at + c.len_utf8())
}
