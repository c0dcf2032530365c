//! Whole-configuration checks
//!
//! Every rule is evaluated; violations are collected under their dotted key
//! (`sessions.ttl_secs`) and surfaced together as one `Validation` error.

use crate::KeywardError;
use std::fmt;

/// One violated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Blank string where a value is needed
    Missing {
        /// Offending setting
        key: String,
    },
    /// Number below its lower bound
    TooSmall {
        /// Offending setting
        key: String,
        /// Smallest accepted value
        min: u64,
        /// Configured value
        actual: u64,
    },
    /// A relationship between values does not hold
    Rule {
        /// Offending setting
        key: String,
        /// Requirement that failed, phrased to follow the key
        rule: String,
    },
}

impl Violation {
    /// Dotted key of the offending setting
    pub fn key(&self) -> &str {
        match self {
            Violation::Missing { key }
            | Violation::TooSmall { key, .. }
            | Violation::Rule { key, .. } => key,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing { key } => write!(f, "{key} must not be blank"),
            Violation::TooSmall { key, min, actual } => {
                write!(f, "{key} must be at least {min}, got {actual}")
            }
            Violation::Rule { key, rule } => write!(f, "{key} {rule}"),
        }
    }
}

/// Collects violations, optionally scoped to a config section
#[derive(Debug, Default)]
pub struct ConfigChecks {
    section: Option<&'static str>,
    violations: Vec<Violation>,
}

impl ConfigChecks {
    /// Empty check set
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `checks` with keys prefixed by `section.`
    pub fn section(&mut self, section: &'static str, checks: impl FnOnce(&mut Self)) -> &mut Self {
        let outer = self.section.replace(section);
        checks(self);
        self.section = outer;
        self
    }

    /// Require a non-blank string
    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            let key = self.key(field);
            self.violations.push(Violation::Missing { key });
        }
        self
    }

    /// Require `value >= min`
    pub fn at_least(&mut self, field: &str, value: u64, min: u64) -> &mut Self {
        if value < min {
            let key = self.key(field);
            self.violations.push(Violation::TooSmall {
                key,
                min,
                actual: value,
            });
        }
        self
    }

    /// Record `rule` against `field` unless `holds`
    pub fn rule(&mut self, field: &str, holds: bool, rule: &str) -> &mut Self {
        if !holds {
            let key = self.key(field);
            self.violations.push(Violation::Rule {
                key,
                rule: rule.to_string(),
            });
        }
        self
    }

    /// Violations recorded so far
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// `Ok` when nothing was violated, otherwise one `Validation` error
    pub fn finish(self) -> Result<(), KeywardError> {
        if self.violations.is_empty() {
            return Ok(());
        }
        Err(KeywardError::Validation {
            errors: self.violations.iter().map(ToString::to_string).collect(),
        })
    }

    fn key(&self, field: &str) -> String {
        match self.section {
            Some(section) => format!("{section}.{field}"),
            None => field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_keys_are_dotted() {
        let mut checks = ConfigChecks::new();
        checks
            .section("sessions", |s| {
                s.at_least("ttl_secs", 0, 1);
            })
            .not_blank("log_filter", "");

        let keys: Vec<_> = checks.violations().iter().map(Violation::key).collect();
        assert_eq!(keys, ["sessions.ttl_secs", "log_filter"]);
        assert_eq!(
            checks.violations()[0].to_string(),
            "sessions.ttl_secs must be at least 1, got 0"
        );
    }

    #[test]
    fn finish_reports_every_violation() {
        let mut checks = ConfigChecks::new();
        checks
            .not_blank("admin_group", " ")
            .rule("refresh_secs", false, "must be smaller than ttl_secs");

        match checks.finish() {
            Err(KeywardError::Validation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
