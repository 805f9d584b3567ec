//! Tag string parsing
//!
//! A tag is a comma separated list of `name` or `name=param` segments.
//! A literal comma inside a parameter is written `\,`. The tag `-` means
//! "do not validate this value at all".

use crate::errors::TagError;

/// Tag value that skips a field entirely
pub const SKIP: &str = "-";

/// One rule named by a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: String,
    /// Parameter after `=`, empty when absent
    pub param: String,
}

impl RuleSpec {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
        }
    }
}

/// Parsed form of a tag string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// `-`: the value is not visited
    Skip,
    /// Rules in declaration order (possibly none)
    Rules(Vec<RuleSpec>),
}

impl Tag {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Rules of the tag; empty for `Skip`
    pub fn rules(&self) -> &[RuleSpec] {
        match self {
            Self::Skip => &[],
            Self::Rules(rules) => rules,
        }
    }
}

/// Parse a tag string into rule specifications.
///
/// An empty tag yields no rules. A segment without a rule name fails the
/// whole tag. Rule names are not checked against a registry here.
///
/// # Example
/// ```
/// use walidator::tags::{parse, RuleSpec, Tag};
///
/// let tag = parse(r"min=0,regexp=^a{3\,10}").unwrap();
/// assert_eq!(
///     tag,
///     Tag::Rules(vec![RuleSpec::new("min", "0"), RuleSpec::new("regexp", "^a{3,10}")])
/// );
/// ```
pub fn parse(tag: &str) -> Result<Tag, TagError> {
    let trimmed = tag.trim();
    if trimmed == SKIP {
        return Ok(Tag::Skip);
    }
    if trimmed.is_empty() {
        return Ok(Tag::Rules(Vec::new()));
    }

    split_segments(trimmed)
        .into_iter()
        .map(|segment| parse_segment(&segment))
        .collect::<Result<Vec<_>, _>>()
        .map(Tag::Rules)
}

/// Split on commas that are not escaped, restoring escaped commas
fn split_segments(tag: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = tag.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn parse_segment(segment: &str) -> Result<RuleSpec, TagError> {
    let (name, param) = match segment.split_once('=') {
        Some((name, param)) => (name.trim(), param.trim()),
        None => (segment.trim(), ""),
    };
    if name.is_empty() {
        return Err(TagError::MalformedSegment(segment.to_string()));
    }
    Ok(RuleSpec::new(name, param))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tag_has_no_rules() {
        assert_eq!(parse("").unwrap(), Tag::Rules(vec![]));
        assert_eq!(parse("   ").unwrap(), Tag::Rules(vec![]));
    }

    #[test]
    fn test_skip() {
        assert!(parse("-").unwrap().is_skip());
        assert!(parse(" - ").unwrap().is_skip());
        assert!(parse("-").unwrap().rules().is_empty());
    }

    #[test]
    fn test_names_and_params_are_trimmed() {
        let tag = parse("min=2, max = 5 ,nonzero").unwrap();
        assert_eq!(
            tag.rules(),
            &[
                RuleSpec::new("min", "2"),
                RuleSpec::new("max", "5"),
                RuleSpec::new("nonzero", ""),
            ]
        );
    }

    #[test]
    fn test_split_on_first_equals() {
        let tag = parse("len==").unwrap();
        assert_eq!(tag.rules(), &[RuleSpec::new("len", "=")]);

        let tag = parse("regexp=^a=b$").unwrap();
        assert_eq!(tag.rules(), &[RuleSpec::new("regexp", "^a=b$")]);
    }

    #[test]
    fn test_escaped_comma() {
        let tag = parse(r"min=0,regexp=^a{3\,10}").unwrap();
        assert_eq!(
            tag.rules(),
            &[RuleSpec::new("min", "0"), RuleSpec::new("regexp", "^a{3,10}")]
        );
    }

    #[test]
    fn test_other_backslashes_are_kept() {
        let tag = parse(r"regexp=^\d+$").unwrap();
        assert_eq!(tag.rules(), &[RuleSpec::new("regexp", r"^\d+$")]);
    }

    #[test]
    fn test_empty_name_is_malformed() {
        assert_eq!(
            parse("=5"),
            Err(TagError::MalformedSegment("=5".to_string()))
        );
        assert!(matches!(parse("min=1,,max=2"), Err(TagError::MalformedSegment(_))));
        assert!(matches!(parse("nonzero,"), Err(TagError::MalformedSegment(_))));
    }
}
