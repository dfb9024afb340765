//! Tags appended to every exported metric.

use crate::{
    error::{Error, Result},
    id::{Tag, is_valid_tag_name},
};

/// Tag name attached when an application name is configured.
pub const APP_TAG: &str = "_app";

/// Process-wide tags from `k=v,k2=v2` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalTags {
    tags: Vec<Tag>,
}

impl GlobalTags {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `raw` strictly and add `_app=<app_name>` when given.
    ///
    /// Names must match `[a-zA-Z_][a-zA-Z0-9_]*` and values must be non-empty.
    /// Commas and equal signs inside values are escaped with a backslash.
    pub fn parse(raw: &str, app_name: Option<&str>) -> Result<Self> {
        let mut tags: Vec<Tag> = Vec::new();
        if !raw.is_empty() {
            for pair in split_unescaped(raw, ',') {
                let parts = split_unescaped(pair, '=');
                let [name, value] = parts.as_slice() else {
                    return Err(Error::malformed_tag(pair));
                };
                if value.is_empty() || !is_valid_tag_name(name) {
                    return Err(Error::malformed_tag(pair));
                }
                let value = value.replace("\\,", ",").replace("\\=", "=");
                insert(&mut tags, Tag::new(*name, value));
            }
        }
        if let Some(app) = app_name.filter(|a| !a.is_empty()) {
            insert(&mut tags, Tag::new(APP_TAG, app));
        }
        Ok(Self { tags })
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

fn insert(tags: &mut Vec<Tag>, tag: Tag) {
    tags.retain(|t| t.name() != tag.name());
    tags.push(tag);
}

/// Split at every `sep` not preceded by a backslash.
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if c == sep && !escaped {
            parts.push(&input[start..i]);
            start = i + c.len_utf8();
        }
        escaped = c == '\\';
    }
    parts.push(&input[start..]);
    parts
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn parses_pairs_and_unescapes_values() {
        let tags = GlobalTags::parse(r"region=eu\,west,expr=a\=b", None).unwrap();
        assert_eq!(
            tags.tags(),
            &[Tag::new("region", "eu,west"), Tag::new("expr", "a=b")]
        );
    }

    #[test]
    fn app_name_becomes_a_tag() {
        let tags = GlobalTags::parse("", Some("shop")).unwrap();
        assert_eq!(tags.tags(), &[Tag::new(APP_TAG, "shop")]);
        assert!(GlobalTags::parse("", Some("")).unwrap().is_empty());
    }

    #[rstest]
    #[case::empty_entry("a=1,,b=2")]
    #[case::missing_value("a=")]
    #[case::missing_equals("a")]
    #[case::bad_name("1a=x")]
    #[case::dash_in_name("a-b=x")]
    #[case::two_equals("a=b=c")]
    fn rejects_malformed_input(#[case] raw: &str) {
        assert!(matches!(
            GlobalTags::parse(raw, None),
            Err(Error::MalformedTag { .. })
        ));
    }
}
