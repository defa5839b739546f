//! Rules, the rule arena, and the ordered rule-matching algorithm.
//!
//! A [`RuleSet`] is an arena of [`Rule`]s addressed by [`RuleId`]. Children
//! lists refer to other rules by id, so one rule can be shared by any number
//! of parents and rules may refer to each other cyclically (a list item
//! contains lists which contain list items).
//!
//! # Matching
//!
//! [`RuleSet::apply`] formats a span of text with one rule's children:
//!
//! 1. Every child is matched against the remaining tail; results are cached.
//! 2. The match with the smallest start offset wins. Ties go to the child
//!    declared first.
//! 3. Text in front of the winner is handed to the rule's fallback (or copied
//!    verbatim), then the winner's transform is emitted.
//! 4. The tail is advanced past the match. Cached matches that start after the
//!    consumed region are shifted; overlapped ones are dropped and rescanned
//!    on the next round.
//!
//! A child that found no match keeps that result for the rest of the span: a
//! pattern that fails on a tail fails on every suffix of it, except through a
//! start anchor, and the grammar only anchors at line starts.

use std::borrow::Cow;

use regex::Regex;

use crate::links::{self, LinkKind};
use crate::options::FormatOptions;
use crate::pattern::{MatchRecord, Pattern};

/// Stable index of a rule inside its [`RuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(usize);

/// How a matched rule turns its captures into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Format the capture with the rule's own children, without a tag.
    Transparent { capture: usize },
    /// Wrap the recursively formatted capture in `<tag>...</tag>`.
    ///
    /// With `skip_empty`, an empty capture produces no output at all.
    Element {
        tag: &'static str,
        capture: usize,
        skip_empty: bool,
    },
    /// Emit a bare void element such as `<hr>`.
    Void { tag: &'static str },
    /// Wrap the capture in `<tag>...</tag>` without further formatting.
    /// One trailing newline is dropped.
    Verbatim { tag: &'static str, capture: usize },
    /// Emit the capture as literal text.
    Escaped { capture: usize },
    /// `<img>` from group 1 (source) and optional group 2 (alt text).
    Image,
    /// `<a>` from group 1 (target) and optional group 2 (label).
    Link(LinkKind),
}

impl Transform {
    /// Highest capture group index the transform requires. Link labels and
    /// image alt text are optional groups.
    fn max_group(self) -> usize {
        match self {
            Self::Transparent { capture }
            | Self::Element { capture, .. }
            | Self::Verbatim { capture, .. }
            | Self::Escaped { capture } => capture,
            Self::Void { .. } => 0,
            Self::Image | Self::Link(_) => 1,
        }
    }
}

/// Substitution applied to a capture before it is formatted recursively.
#[derive(Debug, Clone)]
pub struct Rewrite {
    regex: Regex,
    replacement: &'static str,
}

impl Rewrite {
    /// Create a rewrite replacing every match of `regex` with `replacement`
    /// (`${1}`-style group references allowed).
    #[must_use]
    pub fn new(regex: Regex, replacement: &'static str) -> Self {
        Self { regex, replacement }
    }

    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.regex.replace_all(text, self.replacement)
    }
}

/// One markup construct: a pattern, a transform, and the rules allowed to
/// format the construct's inner text.
#[derive(Debug, Clone)]
pub struct Rule {
    name: &'static str,
    pattern: Option<Pattern>,
    transform: Transform,
    rewrite: Option<Rewrite>,
    children: Vec<RuleId>,
    fallback: Option<RuleId>,
}

impl Rule {
    /// Rule name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Pattern, or `None` for container rules that are only ever applied.
    #[must_use]
    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Transform emitted when the rule matches.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Children in priority order.
    #[must_use]
    pub fn children(&self) -> &[RuleId] {
        &self.children
    }

    /// Rule applied to text no child matched.
    #[must_use]
    pub fn fallback(&self) -> Option<RuleId> {
        self.fallback
    }
}

/// Cached state of one child while a span is being formatted.
#[derive(Debug, Clone)]
enum Slot {
    Unscanned,
    Missing,
    Found(MatchRecord),
}

/// Immutable arena of rules.
///
/// Built once with [`RuleSetBuilder`] and shared read-only afterwards;
/// formatting never mutates it.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Look up a rule.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    /// Number of rules in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find a rule by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<RuleId> {
        self.rules.iter().position(|r| r.name == name).map(RuleId)
    }

    /// Format `text` with the children of rule `id`, appending to `out`.
    pub fn apply(&self, id: RuleId, text: &str, options: &FormatOptions, out: &mut String) {
        let rule = self.rule(id);
        let mut slots = vec![Slot::Unscanned; rule.children.len()];
        let mut tail = text;

        loop {
            let mut best: Option<(usize, usize)> = None;
            for (index, &child) in rule.children.iter().enumerate() {
                if matches!(slots[index], Slot::Unscanned) {
                    slots[index] = self.scan(child, tail);
                }
                if let Slot::Found(record) = &slots[index]
                    && best.is_none_or(|(_, start)| record.start < start)
                {
                    best = Some((index, record.start));
                    if record.start == 0 {
                        break;
                    }
                }
            }

            let Some((index, _)) = best else {
                break;
            };
            let Slot::Found(record) = std::mem::replace(&mut slots[index], Slot::Unscanned) else {
                break;
            };
            if record.len == 0 {
                break;
            }

            if record.start > 0 {
                self.fall_back(rule, &tail[..record.start], options, out);
            }
            self.build(rule.children[index], &record, tail, options, out);

            let consumed = record.end();
            tail = &tail[consumed..];
            for slot in &mut slots {
                if let Slot::Found(cached) = slot {
                    if cached.start >= consumed {
                        cached.shift(consumed);
                    } else {
                        *slot = Slot::Unscanned;
                    }
                }
            }
        }

        if !tail.is_empty() {
            self.fall_back(rule, tail, options, out);
        }
    }

    fn scan(&self, id: RuleId, tail: &str) -> Slot {
        match self.rule(id).pattern.as_ref().and_then(|p| p.find(tail)) {
            Some(record) => Slot::Found(record),
            None => Slot::Missing,
        }
    }

    fn fall_back(&self, rule: &Rule, text: &str, options: &FormatOptions, out: &mut String) {
        match rule.fallback {
            Some(fallback) => self.apply(fallback, text, options, out),
            None => out.push_str(text),
        }
    }

    /// Emit the transform of rule `id` for a match found in `tail`.
    fn build(
        &self,
        id: RuleId,
        record: &MatchRecord,
        tail: &str,
        options: &FormatOptions,
        out: &mut String,
    ) {
        let rule = self.rule(id);
        let group = |index: usize| record.group(tail, index).unwrap_or_default();

        match rule.transform {
            Transform::Transparent { capture } => {
                self.recurse(id, group(capture), options, out);
            }
            Transform::Element {
                tag,
                capture,
                skip_empty,
            } => {
                let inner = group(capture);
                if skip_empty && inner.is_empty() {
                    return;
                }
                out.push('<');
                out.push_str(tag);
                out.push('>');
                self.recurse(id, inner, options, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Transform::Void { tag } => {
                out.push('<');
                out.push_str(tag);
                out.push('>');
            }
            Transform::Verbatim { tag, capture } => {
                let inner = group(capture);
                let inner = rule
                    .rewrite
                    .as_ref()
                    .map_or(Cow::Borrowed(inner), |r| r.apply(inner));
                out.push('<');
                out.push_str(tag);
                out.push('>');
                out.push_str(inner.strip_suffix('\n').unwrap_or(&inner));
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Transform::Escaped { capture } => out.push_str(group(capture)),
            Transform::Image => links::write_image(out, group(1), record.group(tail, 2), options),
            Transform::Link(kind) => {
                let target = group(1);
                let label = record.group(tail, 2).unwrap_or(target);
                links::write_link(out, &links::href(kind, target, options), label);
            }
        }
    }

    /// Format a capture with the children of rule `id`, after its rewrite.
    fn recurse(&self, id: RuleId, text: &str, options: &FormatOptions, out: &mut String) {
        if text.is_empty() {
            return;
        }
        match &self.rule(id).rewrite {
            Some(rewrite) => self.apply(id, &rewrite.apply(text), options, out),
            None => self.apply(id, text, options, out),
        }
    }
}

/// Incremental constructor for a [`RuleSet`].
///
/// Rules are declared first and wired together afterwards, which allows
/// shared and cyclic children lists.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a rule matched by `pattern`.
    pub fn rule(&mut self, name: &'static str, pattern: Pattern, transform: Transform) -> RuleId {
        self.push(name, Some(pattern), transform)
    }

    /// Declare a container: a rule without a pattern that is only applied,
    /// as a root or as a fallback.
    pub fn container(&mut self, name: &'static str) -> RuleId {
        self.push(name, None, Transform::Transparent { capture: 0 })
    }

    fn push(&mut self, name: &'static str, pattern: Option<Pattern>, transform: Transform) -> RuleId {
        self.rules.push(Rule {
            name,
            pattern,
            transform,
            rewrite: None,
            children: Vec::new(),
            fallback: None,
        });
        RuleId(self.rules.len() - 1)
    }

    /// Set the children of `id`, highest priority first.
    pub fn children(&mut self, id: RuleId, children: &[RuleId]) -> &mut Self {
        self.rules[id.0].children = children.to_vec();
        self
    }

    /// Set the fallback of `id`.
    pub fn fallback(&mut self, id: RuleId, fallback: RuleId) -> &mut Self {
        self.rules[id.0].fallback = Some(fallback);
        self
    }

    /// Set the capture rewrite of `id`.
    pub fn rewrite(&mut self, id: RuleId, rewrite: Rewrite) -> &mut Self {
        self.rules[id.0].rewrite = Some(rewrite);
        self
    }

    /// Validate and freeze the rule set.
    ///
    /// # Panics
    ///
    /// Panics when a rule is defective: a transform reading a capture group
    /// its pattern does not define, a pattern that can match empty text, a
    /// child without a pattern, or a dangling rule id.
    #[must_use]
    pub fn build(self) -> RuleSet {
        for rule in &self.rules {
            if let Some(pattern) = &rule.pattern {
                let regex = pattern.regex();
                assert!(
                    rule.transform.max_group() < regex.captures_len(),
                    "rule `{}` reads group {} but its pattern has {} groups",
                    rule.name,
                    rule.transform.max_group(),
                    regex.captures_len() - 1,
                );
                assert!(
                    !regex.is_match(""),
                    "rule `{}` matches empty text",
                    rule.name
                );
            }
            for child in rule.children.iter().chain(&rule.fallback) {
                let target = self.rules.get(child.0);
                assert!(target.is_some(), "rule `{}` refers to a missing rule", rule.name);
            }
            for child in &rule.children {
                assert!(
                    self.rules[child.0].pattern.is_some(),
                    "rule `{}` has container `{}` as a child",
                    rule.name,
                    self.rules[child.0].name,
                );
            }
        }
        RuleSet { rules: self.rules }
    }
}
