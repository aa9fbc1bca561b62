//! Structured validation results for library elements

use serde::Serialize;
use std::fmt;

/// A single broken invariant, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Join violations into one line for error messages
pub(crate) fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_summary() {
        let v = vec![
            Violation::new("component", "not set"),
            Violation::new("package", "is the nil UUID"),
        ];
        assert_eq!(v[0].to_string(), "component: not set");
        assert_eq!(summarize(&v), "component: not set; package: is the nil UUID");
    }
}
