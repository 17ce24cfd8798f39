//! Key-presence policy for objects, headers, query params and form fields

use crate::mismatch::MismatchMessages;
use crate::result::Failure;

/// Problem with the key set of a keyed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    MissingKey(String),
    UnexpectedKey(String),
}

impl KeyError {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::MissingKey(name) | Self::UnexpectedKey(name) => name,
        }
    }

    /// Failure breadcrumbed with the offending key
    #[must_use]
    pub fn to_failure(&self, kind: &str, messages: &dyn MismatchMessages) -> Failure {
        let message = match self {
            Self::MissingKey(name) => messages.missing_key(kind, name),
            Self::UnexpectedKey(name) => messages.unexpected_key(kind, name),
        };
        Failure::new(message).breadcrumb(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKeyCheck {
    Validate,
    /// Partial payloads (stubs under construction) may omit mandatory keys
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexpectedKeyCheck {
    Reject,
    Ignore,
}

/// Strict vs. extensible treatment of missing and undeclared keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    pub missing: MissingKeyCheck,
    pub unexpected: UnexpectedKeyCheck,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl KeyPolicy {
    /// Mandatory keys required, undeclared keys rejected
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            missing: MissingKeyCheck::Validate,
            unexpected: UnexpectedKeyCheck::Reject,
        }
    }

    /// Mandatory keys required, undeclared keys ignored
    #[must_use]
    pub const fn extensible() -> Self {
        Self {
            missing: MissingKeyCheck::Validate,
            unexpected: UnexpectedKeyCheck::Ignore,
        }
    }

    #[must_use]
    pub const fn with_unexpected(self, unexpected: UnexpectedKeyCheck) -> Self {
        Self {
            missing: self.missing,
            unexpected,
        }
    }

    #[must_use]
    pub const fn with_missing(self, missing: MissingKeyCheck) -> Self {
        Self {
            missing,
            unexpected: self.unexpected,
        }
    }

    /// Compare declared keys `(name, optional)` against the actual key set.
    ///
    /// When `absorbs_extra` is set (an additional-properties schema exists),
    /// undeclared keys are left to that schema instead of being reported.
    pub fn check<'a>(
        &self,
        declared: impl IntoIterator<Item = (&'a str, bool)>,
        actual: &[&str],
        absorbs_extra: bool,
        same_key: impl Fn(&str, &str) -> bool,
    ) -> Vec<KeyError> {
        let declared: Vec<(&str, bool)> = declared.into_iter().collect();
        let mut errors = Vec::new();

        if self.missing == MissingKeyCheck::Validate {
            for (name, optional) in &declared {
                if !optional && !actual.iter().any(|a| same_key(a, name)) {
                    errors.push(KeyError::MissingKey((*name).to_string()));
                }
            }
        }

        if self.unexpected == UnexpectedKeyCheck::Reject && !absorbs_extra {
            for key in actual {
                if !declared.iter().any(|(name, _)| same_key(key, name)) {
                    errors.push(KeyError::UnexpectedKey((*key).to_string()));
                }
            }
        }

        errors
    }
}

/// Case-sensitive key comparison (JSON, query)
#[must_use]
pub fn exact_key(a: &str, b: &str) -> bool {
    a == b
}

/// Case-insensitive key comparison (HTTP headers)
#[must_use]
pub fn header_key(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mismatch::DefaultMismatchMessages;

    #[test]
    fn strict_reports_missing_and_unexpected() {
        let errors = KeyPolicy::strict().check(
            [("id", false), ("name", true)],
            &["name", "extra"],
            false,
            exact_key,
        );
        assert_eq!(
            errors,
            vec![
                KeyError::MissingKey("id".into()),
                KeyError::UnexpectedKey("extra".into())
            ]
        );
    }

    #[test]
    fn extensible_ignores_unexpected() {
        let errors = KeyPolicy::extensible().check([("id", false)], &["id", "extra"], false, exact_key);
        assert!(errors.is_empty());
    }

    #[test]
    fn additional_properties_absorb_extra_keys() {
        let errors = KeyPolicy::strict().check([("id", false)], &["id", "extra"], true, exact_key);
        assert!(errors.is_empty());
    }

    #[test]
    fn ignore_missing_for_partial_payloads() {
        let policy = KeyPolicy::strict().with_missing(MissingKeyCheck::Ignore);
        assert!(policy.check([("id", false)], &[], false, exact_key).is_empty());
    }

    #[test]
    fn header_keys_compare_case_insensitively() {
        let errors = KeyPolicy::strict().check([("X-Id", false)], &["x-id"], false, header_key);
        assert!(errors.is_empty());
    }

    #[test]
    fn key_error_failure_is_breadcrumbed() {
        let f = KeyError::MissingKey("name".into()).to_failure("key", &DefaultMismatchMessages);
        assert_eq!(f.breadcrumb, "name");
        assert_eq!(f.message, "Expected key named \"name\" was missing");
    }
}
