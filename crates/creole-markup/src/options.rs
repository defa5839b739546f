//! Per-call formatting options.

use std::collections::BTreeMap;

/// Prefix and suffix wrapped around wiki link targets.
///
/// `[[Page]]` with prefix `/wiki/` and suffix `.html` links to
/// `/wiki/Page.html`. Absolute URIs are never formatted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkFormat {
    /// Text placed before the link target.
    pub prefix: String,
    /// Text placed after the link target.
    pub suffix: String,
}

impl LinkFormat {
    /// Create a link format from a prefix and suffix.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Apply the format to a link target.
    #[must_use]
    pub fn apply(&self, target: &str) -> String {
        format!("{}{target}{}", self.prefix, self.suffix)
    }
}

/// Options consulted by link and image transforms.
///
/// Options never change which rule matches; they only affect the attributes
/// emitted for links and images. Values are inserted into HTML attributes
/// as-is, so they must already be HTML-safe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FormatOptions {
    /// Format applied to wiki (non-URI) link targets.
    pub link_format: Option<LinkFormat>,
    /// Alt text for images written without `|alt`.
    pub default_image_text: String,
    /// Interwiki prefixes: `[[Name:Page]]` links to `interwiki["Name"] + "Page"`.
    pub interwiki: BTreeMap<String, String>,
}

impl FormatOptions {
    /// Set the wiki link format.
    #[must_use]
    pub fn with_link_format(mut self, format: LinkFormat) -> Self {
        self.link_format = Some(format);
        self
    }

    /// Set the default image alt text.
    #[must_use]
    pub fn with_default_image_text(mut self, text: impl Into<String>) -> Self {
        self.default_image_text = text.into();
        self
    }

    /// Register an interwiki prefix.
    #[must_use]
    pub fn with_interwiki(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.interwiki.insert(name.into(), url.into());
        self
    }
}
