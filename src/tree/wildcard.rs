//! Wildcard patterns over qualified class names.
//!
//! Retain directives address classes by pattern. Two dialects compose:
//! `*` matches within a single path segment (alone it matches exactly one
//! segment), and `**` - allowed at most once per pattern - matches a run of
//! zero or more whole segments. Nested-class names keep their `$` inside the
//! final segment, so `com/example/*` covers `com/example/Outer$Inner`.

use crate::{Error, Result};

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matches any single segment.
    Any,
    /// Matches the segment verbatim.
    Literal(String),
    /// A segment with embedded `*`: literal parts that must appear in order,
    /// anchored at both ends.
    Glob(Vec<String>),
}

impl Segment {
    fn compile(text: &str) -> Segment {
        if text == "*" {
            Segment::Any
        } else if text.contains('*') {
            Segment::Glob(text.split('*').map(str::to_string).collect())
        } else {
            Segment::Literal(text.to_string())
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Literal(literal) => literal == segment,
            Segment::Glob(parts) => glob_segment(parts, segment),
        }
    }
}

/// Match `parts` (the `*`-split of a glob segment) against `text`. The first
/// part anchors at the start, the last at the end, the middle parts float in
/// order.
fn glob_segment(parts: &[String], text: &str) -> bool {
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return text.is_empty(),
    };
    let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return remaining.is_empty(), // no '*' at all
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    // The trailing part must fit after whatever the middle consumed.
    last.is_empty() || (remaining.len() >= last.len() && remaining.ends_with(last.as_str()))
}

/// A compiled class-name pattern: literal/any-one segments before and after
/// an optional `**` gap.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    head: Vec<Segment>,
    tail: Vec<Segment>,
    has_gap: bool,
}

impl WildcardPattern {
    /// Compile `pattern`, splitting on `/`.
    ///
    /// # Errors
    /// Fails with [`Error::Error`] on an empty pattern, an empty segment, or
    /// more than one `**`.
    pub fn compile(pattern: &str) -> Result<WildcardPattern> {
        if pattern.is_empty() {
            return Err(Error::Error("empty class pattern".to_string()));
        }
        let mut head = Vec::new();
        let mut tail = Vec::new();
        let mut has_gap = false;
        for segment in pattern.split('/') {
            if segment.is_empty() {
                return Err(Error::Error(format!("empty segment in pattern '{pattern}'")));
            }
            if segment == "**" {
                if has_gap {
                    return Err(Error::Error(format!(
                        "more than one '**' in pattern '{pattern}'"
                    )));
                }
                has_gap = true;
            } else if has_gap {
                tail.push(Segment::compile(segment));
            } else {
                head.push(Segment::compile(segment));
            }
        }
        Ok(WildcardPattern {
            head,
            tail,
            has_gap,
        })
    }

    /// `true` if the qualified binary `name` matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let segments: Vec<&str> = name.split('/').collect();
        if !self.has_gap {
            return self.head.len() == segments.len()
                && self
                    .head
                    .iter()
                    .zip(&segments)
                    .all(|(pattern, segment)| pattern.matches(segment));
        }
        if segments.len() < self.head.len() + self.tail.len() {
            return false;
        }
        let head_ok = self
            .head
            .iter()
            .zip(&segments)
            .all(|(pattern, segment)| pattern.matches(segment));
        let tail_start = segments.len() - self.tail.len();
        head_ok
            && self
                .tail
                .iter()
                .zip(&segments[tail_start..])
                .all(|(pattern, segment)| pattern.matches(segment))
    }

    /// `true` when the pattern contains no wildcard at all.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        !self.has_gap
            && self
                .head
                .iter()
                .all(|segment| matches!(segment, Segment::Literal(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        WildcardPattern::compile(pattern).unwrap().matches(name)
    }

    #[test]
    fn exact_pattern() {
        assert!(matches("com/example/Foo", "com/example/Foo"));
        assert!(!matches("com/example/Foo", "com/example/Bar"));
        assert!(!matches("com/example/Foo", "com/example/Foo$In"));
    }

    #[test]
    fn star_matches_exactly_one_segment() {
        assert!(matches("com/example/*", "com/example/Foo"));
        assert!(matches("com/example/*", "com/example/Outer$Inner"));
        assert!(!matches("com/example/*", "com/example/deep/Foo"));
        assert!(!matches("com/*", "com"));
    }

    #[test]
    fn star_within_a_segment() {
        assert!(matches("com/example/Foo*", "com/example/FooImpl"));
        assert!(matches("com/example/*Impl", "com/example/FooImpl"));
        assert!(matches("com/*ample/Foo", "com/example/Foo"));
        assert!(!matches("com/example/Foo*Bar", "com/example/FooImpl"));
        assert!(matches("com/example/F*o*r", "com/example/FooBar"));
    }

    #[test]
    fn double_star_spans_zero_or_more_segments() {
        assert!(matches("com/**/Foo", "com/Foo"));
        assert!(matches("com/**/Foo", "com/a/b/Foo"));
        assert!(matches("**/Foo", "Foo"));
        assert!(matches("com/**", "com/a/b/C"));
        assert!(!matches("com/**/Foo", "org/a/Foo"));
    }

    #[test]
    fn double_star_allowed_at_most_once() {
        assert!(WildcardPattern::compile("**/a/**").is_err());
        assert!(WildcardPattern::compile("").is_err());
        assert!(WildcardPattern::compile("com//Foo").is_err());
    }

    #[test]
    fn exactness() {
        assert!(WildcardPattern::compile("com/example/Foo").unwrap().is_exact());
        assert!(!WildcardPattern::compile("com/*/Foo").unwrap().is_exact());
        assert!(!WildcardPattern::compile("com/**").unwrap().is_exact());
    }
}
