//! Validation failures.
//!
//! A failure pinpoints one constraint violation: the dotted path of the
//! offending field, the kind of constraint, the rejected value, and a
//! human-readable message. Failures aggregate so a caller sees every
//! problem in a source object at once.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The constraint a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// A required field was absent
    Required,
    /// Null where the field is not nullable
    InvalidNull,
    /// Empty string where blanks are not allowed
    InvalidBlank,
    /// Wrong JSON type for the field kind
    TypeMismatch,
    /// Outside the configured numeric bounds
    OutOfRange,
    /// Not in the closed set of choices
    InvalidChoice,
    /// Malformed for the field's format (color, path, id)
    InvalidFormat,
    /// Repeated element in a set
    Duplicate,
    /// Rejected by a custom predicate
    Custom,
    /// Rejected by a cross-field validator
    Joint,
}

/// One constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    /// Dotted path from the document root, e.g. `items.2.name`
    pub path: String,
    pub kind: FailureKind,
    /// The value that was rejected
    pub value: Value,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(
        path: impl Into<String>,
        kind: FailureKind,
        value: Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            value,
            message: message.into(),
        }
    }

    /// The same failure re-rooted under a path prefix.
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            path: join_path(prefix, &self.path),
            ..self.clone()
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// An aggregate of validation failures.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValidationFailures(Vec<ValidationFailure>);

impl ValidationFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.0.push(failure);
    }

    pub fn extend(&mut self, other: ValidationFailures) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&ValidationFailure> {
        self.0.first()
    }

    /// Every failure re-rooted under a path prefix.
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(self.0.iter().map(|f| f.prefixed(prefix)).collect())
    }
}

impl From<ValidationFailure> for ValidationFailures {
    fn from(failure: ValidationFailure) -> Self {
        Self(vec![failure])
    }
}

impl IntoIterator for ValidationFailures {
    type Item = ValidationFailure;
    type IntoIter = std::vec::IntoIter<ValidationFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationFailures {
    type Item = &'a ValidationFailure;
    type IntoIter = std::slice::Iter<'a, ValidationFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

/// Join a path prefix and a segment with a dot, tolerating empty prefixes.
pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_includes_path_when_present() {
        let failure = ValidationFailure::new(
            "hp",
            FailureKind::OutOfRange,
            json!(-5),
            "must be at least 0",
        );
        assert_eq!(failure.to_string(), "hp: must be at least 0");

        let failure = ValidationFailure::new("", FailureKind::Joint, json!(null), "hp exceeds max");
        assert_eq!(failure.to_string(), "hp exceeds max");
    }

    #[test]
    fn prefixed_reroots_paths() {
        let failure =
            ValidationFailure::new("name", FailureKind::Required, json!(null), "field is required");
        assert_eq!(failure.prefixed("items.2").path, "items.2.name");
    }

    #[test]
    fn failures_aggregate_and_display() {
        let mut failures = ValidationFailures::new();
        failures.push(ValidationFailure::new(
            "name",
            FailureKind::Required,
            json!(null),
            "field is required",
        ));
        failures.push(ValidationFailure::new(
            "hp",
            FailureKind::TypeMismatch,
            json!("x"),
            "expected a number, got string",
        ));
        assert_eq!(failures.len(), 2);
        assert_eq!(
            failures.to_string(),
            "name: field is required; hp: expected a number, got string"
        );
    }

    #[test]
    fn join_path_tolerates_empty_prefix() {
        assert_eq!(join_path("", "name"), "name");
        assert_eq!(join_path("items.0", "name"), "items.0.name");
    }

    #[test]
    fn serializes_camel_case() {
        let failure = ValidationFailure::new("hp", FailureKind::TypeMismatch, json!("x"), "bad");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["kind"], json!("typeMismatch"));
        assert_eq!(value["path"], json!("hp"));
    }
}
