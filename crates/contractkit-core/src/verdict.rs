//! Verdict policy: turns test outcomes into pass/fail and an exit code

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contract_test::{TestOutcome, TestResult};

/// Exit code for contract violations
pub const EXIT_FAILED: i32 = 2;
/// Exit code for partial successes under strict mode
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code when tests could not be run (tool error)
pub const EXIT_ERRORED: i32 = 3;

/// Policy for judging test outcomes
#[derive(Debug, Clone)]
pub struct VerdictPolicy {
    /// Strict mode: partial successes fail the run
    pub strict: bool,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Outcome counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCounts {
    pub total: u64,
    pub passed: u64,
    pub partial: u64,
    pub failed: u64,
    pub errored: u64,
}

impl TestCounts {
    #[must_use]
    pub fn tally(outcomes: &[TestOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.total += 1;
            match outcome.result {
                TestResult::Passed => counts.passed += 1,
                TestResult::PartiallyPassed(_) => counts.partial += 1,
                TestResult::Failed(_) => counts.failed += 1,
                TestResult::Errored(_) => counts.errored += 1,
            }
        }
        counts
    }
}

impl VerdictPolicy {
    /// Create a lenient policy (partial successes pass)
    #[must_use]
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Whether a single outcome counts against the run
    #[must_use]
    pub fn is_failure(&self, result: &TestResult) -> bool {
        match result {
            TestResult::Passed => false,
            TestResult::PartiallyPassed(_) => self.strict,
            TestResult::Failed(_) | TestResult::Errored(_) => true,
        }
    }

    /// Contract violations win over partial successes, which win over tool
    /// errors.
    #[must_use]
    pub fn exit_code(&self, counts: &TestCounts) -> i32 {
        if counts.failed > 0 {
            return EXIT_FAILED;
        }
        if self.strict && counts.partial > 0 {
            return EXIT_PARTIAL;
        }
        if counts.errored > 0 {
            return EXIT_ERRORED;
        }
        0
    }

    /// PASS requires at least one test and no outcome counting as a failure.
    #[must_use]
    pub fn verdict(&self, outcomes: &[TestOutcome]) -> Verdict {
        let counts = TestCounts::tally(outcomes);
        if counts.total == 0 {
            return Verdict {
                status: VerdictStatus::Fail,
                exit_code: EXIT_ERRORED,
                reason: "No tests were run".to_string(),
                counts,
            };
        }

        let failing = outcomes.iter().filter(|o| self.is_failure(&o.result)).count();
        let status = if failing == 0 {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };

        let reason = if status == VerdictStatus::Pass && counts.partial == 0 {
            "All tests passed".to_string()
        } else {
            let mut parts = Vec::new();
            if counts.failed > 0 {
                parts.push(format!("{} failed", counts.failed));
            }
            if counts.partial > 0 {
                let note = if self.strict { "" } else { " (allowed)" };
                parts.push(format!("{} partially passed{note}", counts.partial));
            }
            if counts.errored > 0 {
                parts.push(format!("{} errors", counts.errored));
            }
            format!("{} of {} tests: {}", failing, counts.total, parts.join("; "))
        };

        Verdict {
            status,
            exit_code: self.exit_code(&counts),
            reason,
            counts,
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
    pub counts: TestCounts,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Failure;

    fn outcome(result: TestResult) -> TestOutcome {
        TestOutcome {
            result,
            ..TestOutcome::errored("t", "")
        }
    }

    fn passed() -> TestOutcome {
        outcome(TestResult::Passed)
    }

    fn partial() -> TestOutcome {
        outcome(TestResult::PartiallyPassed("matched the default response".into()))
    }

    fn failed() -> TestOutcome {
        outcome(TestResult::Failed(Failure::new("boom")))
    }

    fn errored() -> TestOutcome {
        outcome(TestResult::Errored("connection refused".into()))
    }

    #[test]
    fn default_policy_is_strict() {
        assert!(VerdictPolicy::default().strict);
    }

    #[test]
    fn all_passed() {
        let v = VerdictPolicy::default().verdict(&[passed(), passed()]);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.exit_code, 0);
        assert_eq!(v.reason, "All tests passed");
        assert_eq!(v.counts.passed, 2);
    }

    #[test]
    fn no_tests_is_fail() {
        let v = VerdictPolicy::default().verdict(&[]);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, EXIT_ERRORED);
    }

    #[test]
    fn partial_fails_only_when_strict() {
        let outcomes = [passed(), partial()];
        let strict = VerdictPolicy::default().verdict(&outcomes);
        assert_eq!(strict.status, VerdictStatus::Fail);
        assert_eq!(strict.exit_code, EXIT_PARTIAL);

        let lenient = VerdictPolicy::lenient().verdict(&outcomes);
        assert_eq!(lenient.status, VerdictStatus::Pass);
        assert_eq!(lenient.exit_code, 0);
        assert!(lenient.reason.contains("1 partially passed (allowed)"));
    }

    #[test]
    fn failures_take_precedence_over_errors() {
        let v = VerdictPolicy::default().verdict(&[failed(), errored(), passed()]);
        assert_eq!(v.exit_code, EXIT_FAILED);
        assert_eq!(v.reason, "2 of 3 tests: 1 failed; 1 errors");
    }

    #[test]
    fn errors_only_returns_3() {
        let v = VerdictPolicy::default().verdict(&[errored()]);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, EXIT_ERRORED);
    }
}
