//! Tags and tag-sets.
//!
//! A tag is a plain UTF-8 token; a tag-set is an unordered set of tags that
//! identifies one logical storage slot. Two tag-sets are equal iff they
//! contain the same elements. Clients write tag-sets as slash-separated
//! strings (`work/notes/2024`), so `/` is reserved and cannot appear inside
//! a tag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator used in canonical keys. Never valid inside a tag.
const CANONICAL_SEP: char = '\u{1f}';

/// Errors from tag and tag-set validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tags must not be empty")]
    Empty,

    #[error("tag {0:?} contains a reserved character")]
    ReservedChar(String),

    #[error("a tag-set with at least one tag is required")]
    EmptySet,
}

/// A single validated tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Validate and wrap a tag token.
    pub fn new(s: impl Into<String>) -> Result<Self, TagError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TagError::Empty);
        }
        if s.contains('/') || s.contains(CANONICAL_SEP) || s.chars().any(char::is_control) {
            return Err(TagError::ReservedChar(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> String {
        tag.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An unordered set of unique tags identifying one logical slot.
///
/// May be empty (e.g. an empty namespace); operations that need at least
/// one tag enforce that at the API boundary via [`TagSet::require_tags`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    /// True when every tag of `self` is in `other`.
    pub fn is_subset(&self, other: &TagSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// True when `self` contains every tag of `other`.
    pub fn is_superset(&self, other: &TagSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Set union; neither operand is modified.
    pub fn union(&self, other: &TagSet) -> TagSet {
        TagSet(self.0.union(&other.0).cloned().collect())
    }

    /// Tags of `self` not present in `other`.
    pub fn difference(&self, other: &TagSet) -> TagSet {
        TagSet(self.0.difference(&other.0).cloned().collect())
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0.insert(tag);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Canonical lookup key: sorted tags joined by a separator that cannot
    /// appear inside a tag. Equal tag-sets always produce equal keys.
    pub fn canonical_key(&self) -> String {
        let mut key = String::new();
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                key.push(CANONICAL_SEP);
            }
            key.push_str(tag.as_str());
        }
        key
    }

    /// Fail with `EmptySet` unless the set has at least one tag.
    pub fn require_tags(&self) -> Result<&Self, TagError> {
        if self.is_empty() {
            Err(TagError::EmptySet)
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(Tag::as_str).collect();
        write!(f, "{}", joined.join("/"))
    }
}

impl FromStr for TagSet {
    type Err = TagError;

    /// Parse a slash-separated tag string. The empty string parses to the
    /// empty tag-set; empty segments (`a//b`) are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::new());
        }
        s.split('/').map(Tag::new).collect()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagSet(iter.into_iter().collect())
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = <BTreeSet<Tag> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl TryFrom<Vec<String>> for TagSet {
    type Error = TagError;

    fn try_from(tags: Vec<String>) -> Result<Self, Self::Error> {
        tags.into_iter().map(Tag::new).collect()
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Vec<String> {
        set.0.into_iter().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> TagSet {
        s.parse().unwrap()
    }

    #[test]
    fn test_tag_rejects_empty() {
        assert_eq!(Tag::new(""), Err(TagError::Empty));
    }

    #[test]
    fn test_tag_rejects_slash() {
        assert!(matches!(Tag::new("a/b"), Err(TagError::ReservedChar(_))));
    }

    #[test]
    fn test_tag_rejects_control_chars() {
        assert!(matches!(Tag::new("a\nb"), Err(TagError::ReservedChar(_))));
        assert!(matches!(
            Tag::new("a\u{1f}b"),
            Err(TagError::ReservedChar(_))
        ));
    }

    #[test]
    fn test_tagset_equality_is_set_equality() {
        assert_eq!(ts("a/b/c"), ts("c/b/a"));
        assert_eq!(ts("a/a/b"), ts("a/b"));
        assert_ne!(ts("a/b"), ts("a/b/c"));
    }

    #[test]
    fn test_tagset_parse_rejects_empty_segment() {
        assert!("a//b".parse::<TagSet>().is_err());
        assert!("/a".parse::<TagSet>().is_err());
    }

    #[test]
    fn test_tagset_parse_empty_string() {
        assert!(ts("").is_empty());
    }

    #[test]
    fn test_subset_superset() {
        assert!(ts("a").is_subset(&ts("a/b")));
        assert!(ts("a/b").is_superset(&ts("a")));
        assert!(ts("a/b").is_subset(&ts("a/b")));
        assert!(!ts("a/c").is_subset(&ts("a/b")));
    }

    #[test]
    fn test_union_difference() {
        assert_eq!(ts("a/b").union(&ts("b/c")), ts("a/b/c"));
        assert_eq!(ts("a/b/c").difference(&ts("b")), ts("a/c"));
        assert_eq!(ts("a").difference(&ts("a")), TagSet::new());
    }

    #[test]
    fn test_canonical_key_is_order_independent() {
        assert_eq!(ts("b/a").canonical_key(), ts("a/b").canonical_key());
        assert_ne!(ts("a/b").canonical_key(), ts("a/c").canonical_key());
    }

    #[test]
    fn test_canonical_key_no_concat_collision() {
        // {"ab"} and {"a","b"} must not collide
        let joined = ts("ab");
        let split = ts("a/b");
        assert_ne!(joined.canonical_key(), split.canonical_key());
    }

    #[test]
    fn test_display_sorted_slash_joined() {
        assert_eq!(ts("c/a/b").to_string(), "a/b/c");
    }

    #[test]
    fn test_require_tags() {
        assert!(ts("a").require_tags().is_ok());
        assert_eq!(TagSet::new().require_tags(), Err(TagError::EmptySet));
    }

    #[test]
    fn test_serde_as_string_list() {
        let set = ts("b/a");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: TagSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn test_serde_rejects_invalid_tag() {
        let result: Result<TagSet, _> = serde_json::from_str(r#"["ok",""]"#);
        assert!(result.is_err());
    }
}
