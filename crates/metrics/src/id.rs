//! Metric identity: a name plus a set of tags.

use std::{collections::BTreeMap, fmt};

use tracing::warn;

use crate::error::{Error, Result};

/// A single `name=value` tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    name: String,
    value: String,
}

impl Tag {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `name=value` string, splitting at the first `=`.
    ///
    /// The name must match `[a-zA-Z_][a-zA-Z0-9_]*`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('=') {
            Some((name, value)) if is_valid_tag_name(name.trim()) => {
                Ok(Self::new(name.trim(), value.trim()))
            },
            _ => Err(Error::malformed_tag(raw)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

pub(crate) fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse tag strings supplied at registration time.
///
/// Entries without a `=` or with an invalid name are logged and dropped.
pub fn parse_tags<S: AsRef<str>>(raw: &[S]) -> Vec<Tag> {
    raw.iter()
        .filter_map(|s| match Tag::parse(s.as_ref()) {
            Ok(tag) => Some(tag),
            Err(_) => {
                warn!(tag = %s.as_ref(), "skipping malformed tag, expected name=value");
                None
            },
        })
        .collect()
}

/// The registry key of a metric.
///
/// Tags are kept sorted by name, so two ids built from the same pairs in a
/// different order compare equal. A repeated tag name keeps the last value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricId {
    name: String,
    tags: BTreeMap<String, String>,
}

impl MetricId {
    #[must_use]
    pub fn new(name: impl Into<String>, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(|t| (t.name, t.value)).collect(),
        }
    }

    #[must_use]
    pub fn untagged(name: impl Into<String>) -> Self {
        Self::new(name, [])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    #[must_use]
    pub fn tags_as_list(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .map(|(name, value)| Tag::new(name.clone(), value.clone()))
            .collect()
    }

    /// Own tags merged with `extra`; own tags win on a name clash.
    #[must_use]
    pub fn tags_with(&self, extra: &[Tag]) -> BTreeMap<String, String> {
        let mut merged = self.tags.clone();
        for tag in extra {
            merged
                .entry(tag.name.clone())
                .or_insert_with(|| tag.value.clone());
        }
        merged
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        f.write_str(&tag_suffix(&self.tags))
    }
}

/// `;k=v;k2=v2`, with `;` inside values replaced so the suffix stays parseable.
#[must_use]
pub fn tag_suffix(tags: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in tags {
        out.push(';');
        out.push_str(name);
        out.push('=');
        out.push_str(&value.replace(';', "_"));
    }
    out
}
