//! Path tracking and violation recording
//!
//! A [`PathTracker`] follows the walk with a push/pop stack of segments and
//! records every violation under the fully rendered current path.

use crate::errors::{ErrorKind, ValidationErrors, ValidationResult, Violation};
use std::borrow::Cow;
use std::fmt::Write;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Struct field, rendered `.name`
    Field(Cow<'static, str>),
    /// Sequence or array position, rendered `[i]`
    Index(usize),
    /// Map key, rendered `[key](key)`
    MapKey(String),
    /// Map value, rendered `[key](value)`
    MapValue(String),
}

/// Current position of a walk plus the violations recorded so far
#[derive(Debug, Default)]
pub struct PathTracker {
    segments: Vec<Segment>,
    errors: ValidationErrors,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn push_field(&mut self, name: impl Into<Cow<'static, str>>) {
        self.push(Segment::Field(name.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.push(Segment::Index(index));
    }

    pub fn push_map_key(&mut self, key: impl Into<String>) {
        self.push(Segment::MapKey(key.into()));
    }

    pub fn push_map_value(&mut self, key: impl Into<String>) {
        self.push(Segment::MapValue(key.into()));
    }

    /// Remove the most recently pushed segment
    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// Number of segments currently pushed
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Run `f` with `segment` pushed, popping it afterwards
    pub fn scoped<R>(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push(segment);
        let result = f(self);
        self.pop();
        result
    }

    /// Render the current path (e.g. "Sub.C", "Slices[1].A", "M[{A:3}](key).A")
    pub fn current(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Index(i) => {
                    let _ = write!(out, "[{}]", i);
                }
                Segment::MapKey(key) => {
                    let _ = write!(out, "[{}](key)", key);
                }
                Segment::MapValue(key) => {
                    let _ = write!(out, "[{}](value)", key);
                }
            }
        }
        out
    }

    /// Record a violation at the current path
    pub fn record(&mut self, rule: &str, kind: ErrorKind, message: impl Into<String>) {
        let violation = Violation {
            path: self.current(),
            rule: rule.to_string(),
            kind,
            message: message.into(),
        };
        self.errors.add(violation);
    }

    /// Ok when nothing was recorded, the full path map otherwise
    pub fn finalize(self) -> ValidationResult {
        self.errors.into_result()
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Handle through which a rule reports failures at the current path
pub struct Reporter<'a> {
    tracker: &'a mut PathTracker,
    rule: &'a str,
}

impl<'a> Reporter<'a> {
    pub fn new(tracker: &'a mut PathTracker, rule: &'a str) -> Self {
        Self { tracker, rule }
    }

    /// Path the rule is evaluated at
    pub fn path(&self) -> String {
        self.tracker.current()
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.tracker.record(self.rule, kind, message);
    }

    /// Report a failure from a user-registered rule
    pub fn error(&mut self, message: impl Into<String>) {
        self.fail(ErrorKind::Custom, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let mut path = PathTracker::new();
        assert_eq!(path.current(), "");

        path.push_field("Slices");
        path.push_index(1);
        path.push_field("A");
        assert_eq!(path.current(), "Slices[1].A");

        path.pop();
        path.pop();
        path.pop();
        path.push_field("M");
        path.push_map_key("{A:3}");
        path.push_field("A");
        assert_eq!(path.current(), "M[{A:3}](key).A");

        path.pop();
        path.pop();
        path.push_map_value("{A:3}");
        assert_eq!(path.current(), "M[{A:3}](value)");
    }

    #[test]
    fn test_root_index_has_no_leading_dot() {
        let mut path = PathTracker::new();
        path.push_index(0);
        path.push_field("name");
        assert_eq!(path.current(), "[0].name");
    }

    #[test]
    fn test_scoped_restores_depth() {
        let mut path = PathTracker::new();
        path.push_field("Sub");
        path.scoped(Segment::Field("C".into()), |p| {
            p.record("nonzero", ErrorKind::ZeroValue, "zero value");
            p.record("min", ErrorKind::Min, "less than min 1");
        });
        assert_eq!(path.depth(), 1);
        assert_eq!(path.current(), "Sub");

        let errors = path.finalize().unwrap_err();
        assert_eq!(errors.get("Sub.C").len(), 2);
    }

    #[test]
    fn test_reporter_records_rule_name() {
        let mut path = PathTracker::new();
        path.push_field("A");
        {
            let mut reporter = Reporter::new(&mut path, "notzz");
            assert_eq!(reporter.path(), "A");
            reporter.error("value cannot be ZZ");
        }
        let errors = path.finalize().unwrap_err();
        let violation = &errors.get("A")[0];
        assert_eq!(violation.rule, "notzz");
        assert_eq!(violation.kind, ErrorKind::Custom);
    }

    #[test]
    fn test_finalize_empty_is_ok() {
        let mut path = PathTracker::new();
        path.push_field("A");
        path.pop();
        assert!(path.finalize().is_ok());
    }
}
