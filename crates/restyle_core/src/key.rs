//! Hierarchical property keys
//!
//! A property is addressed by a dotted path of segments (`border.color`).
//! Keys hash and compare by their full path; ordering ranks shallower keys
//! before deeper ones.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

/// A hierarchical property path (e.g. `border.color`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct PropertyKey {
    segments: SmallVec<[String; 2]>,
}

impl PropertyKey {
    /// Create a single-segment key
    pub fn new(segment: impl Into<String>) -> Self {
        let mut segments = SmallVec::new();
        segments.push(segment.into());
        Self { segments }
    }

    /// Parse a dotted path; empty segments are skipped
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Derive a child key with one more segment
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments in the path
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether `prefix` is a leading sub-path of this key
    pub fn starts_with(&self, prefix: &PropertyKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl PartialOrd for PropertyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth()
            .cmp(&other.depth())
            .then_with(|| self.segments.cmp(&other.segments))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for PropertyKey {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let key = PropertyKey::parse("border.color");
        assert_eq!(key.depth(), 2);
        assert_eq!(key.to_string(), "border.color");
    }

    #[test]
    fn append_derives_child_keys() {
        let key = PropertyKey::new("border").append("color");
        assert_eq!(key, PropertyKey::parse("border.color"));
        assert!(key.starts_with(&PropertyKey::new("border")));
        assert!(!key.starts_with(&PropertyKey::new("color")));
    }

    #[test]
    fn ordering_ranks_by_depth_first() {
        let shallow = PropertyKey::new("z");
        let deep = PropertyKey::parse("a.b");
        assert!(shallow < deep);

        let a = PropertyKey::parse("a.a");
        let b = PropertyKey::parse("a.b");
        assert!(a < b);
    }

    #[test]
    fn empty_segments_are_skipped() {
        assert_eq!(PropertyKey::parse("a..b"), PropertyKey::parse("a.b"));
        assert_eq!(PropertyKey::parse("").depth(), 0);
    }
}
