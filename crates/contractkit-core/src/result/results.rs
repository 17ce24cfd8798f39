//! Outcomes of evaluating several candidates against one input

use std::fmt;

use super::{Failure, MatchResult};

/// Results of matching one input against many candidates, in candidate order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    results: Vec<MatchResult>,
}

impl Results {
    #[must_use]
    pub fn new(results: Vec<MatchResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    #[must_use]
    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// At least one candidate matched
    #[must_use]
    pub fn has_success(&self) -> bool {
        self.results.iter().any(MatchResult::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.results.iter().filter_map(MatchResult::as_failure)
    }

    /// Keep only the least fluffy failures.
    ///
    /// Levels are tried from 0 upward; the first level with any failure wins.
    /// Failures of equal level keep their original (first-seen) order.
    #[must_use]
    pub fn without_fluff(&self) -> Self {
        let Some(floor) = self.failures().map(Failure::fluff_level).min() else {
            return Self::default();
        };
        Self {
            results: self
                .results
                .iter()
                .filter(|r| matches!(r, MatchResult::Failure(f) if f.fluff_level() == floor))
                .cloned()
                .collect(),
        }
    }

    /// Rendered reports of every failure, duplicates removed
    #[must_use]
    pub fn distinct_report(&self) -> String {
        let mut seen: Vec<String> = Vec::new();
        for failure in self.failures() {
            let text = failure.report().to_string();
            if !seen.contains(&text) {
                seen.push(text);
            }
        }
        seen.join("\n\n")
    }

    /// The message shown when no stub or scenario accepts an input
    #[must_use]
    pub fn stub_match_error_message(&self, input_description: &str) -> String {
        let report = self.without_fluff().distinct_report();
        if report.is_empty() {
            format!("No matching contract found for {input_description}")
        } else {
            format!("No matching contract found for {input_description}\n\n{report}")
        }
    }
}

/// Every candidate scenario rejected the input.
#[derive(Debug, Clone, PartialEq)]
pub struct NoMatchingScenario {
    pub results: Results,
    pub input: String,
}

impl NoMatchingScenario {
    #[must_use]
    pub fn new(results: Results, input: impl Into<String>) -> Self {
        Self {
            results,
            input: input.into(),
        }
    }
}

impl fmt::Display for NoMatchingScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.results.stub_match_error_message(&self.input))
    }
}

impl std::error::Error for NoMatchingScenario {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FailureReason;

    fn three_candidates() -> Results {
        Results::new(vec![
            MatchResult::Failure(
                Failure::new("Expected /users/(id), actual was /orders")
                    .with_reason(FailureReason::UrlPathMismatch),
            ),
            MatchResult::Failure(
                Failure::new("Expected application/json, actual was text/plain")
                    .with_reason(FailureReason::ContentTypeMismatch),
            ),
            MatchResult::Failure(
                Failure::new("Expected number, actual was \"x\" (string)")
                    .breadcrumb("age")
                    .breadcrumb("BODY"),
            ),
        ])
    }

    #[test]
    fn keeps_only_deepest_failures() {
        let filtered = three_candidates().without_fluff();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.failures().next().unwrap().fluff_level(), 0);
    }

    #[test]
    fn stub_error_shows_only_level_zero() {
        let message = three_candidates().stub_match_error_message("POST /users");
        insta::assert_snapshot!(message, @r#"
        No matching contract found for POST /users

        >> BODY.age

           Expected number, actual was "x" (string)
        "#);
    }

    #[test]
    fn equal_fluff_keeps_first_seen_order() {
        let results = Results::new(vec![
            MatchResult::failure("first"),
            MatchResult::success(),
            MatchResult::failure("second"),
        ]);
        let filtered = results.without_fluff();
        let messages: Vec<&str> = filtered.failures().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn falls_back_to_next_level() {
        let results = Results::new(vec![
            MatchResult::Failure(
                Failure::new("path").with_reason(FailureReason::UrlPathMismatch),
            ),
            MatchResult::Failure(
                Failure::new("status").with_reason(FailureReason::StatusMismatch),
            ),
        ]);
        let filtered = results.without_fluff();
        assert_eq!(filtered.failures().next().unwrap().message, "status");
    }

    #[test]
    fn distinct_report_dedups() {
        let results = Results::new(vec![
            MatchResult::failure("same"),
            MatchResult::failure("same"),
        ]);
        assert_eq!(results.distinct_report(), "   same");
    }
}
