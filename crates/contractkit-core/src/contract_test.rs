//! Contract tests: one generated request, one response, one judgement

use std::fmt;

use thiserror::Error;

use crate::error::EngineError;
use crate::http::{HttpRequest, HttpResponse};
use crate::result::{Failure, MatchResult};
use crate::scenario::Scenario;

/// Sends a request to the system under test.
pub trait TestExecutor {
    /// # Errors
    ///
    /// Transport problems; a response with any status is not an error.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError>;
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// How a single test ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Passed,
    /// Accepted only against a fallback; the note says which
    PartiallyPassed(String),
    Failed(Failure),
    /// The test could not be run (generation or transport error)
    Errored(String),
}

impl TestResult {
    fn from_match(result: MatchResult) -> Self {
        match result {
            MatchResult::Success(s) => match s.partial {
                Some(note) => Self::PartiallyPassed(note),
                None => Self::Passed,
            },
            MatchResult::Failure(f) if f.partial => Self::PartiallyPassed(f.report().to_string()),
            MatchResult::Failure(f) => Self::Failed(f),
        }
    }

    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::PartiallyPassed(_) => write!(f, "PARTIAL"),
            Self::Failed(_) => write!(f, "FAILED"),
            Self::Errored(_) => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub description: String,
    /// `METHOD /path/template`; empty when the test could not be generated
    pub operation: String,
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub result: TestResult,
}

impl TestOutcome {
    #[must_use]
    pub fn errored(description: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            description: description.into(),
            operation: String::new(),
            request: None,
            response: None,
            result: TestResult::Errored(error.to_string()),
        }
    }

    /// Failure report, partial-success note or error text
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match &self.result {
            TestResult::Passed => None,
            TestResult::PartiallyPassed(note) | TestResult::Errored(note) => Some(note.clone()),
            TestResult::Failed(failure) => Some(failure.report().to_string()),
        }
    }
}

/// A scenario specialized down to a single request shape.
#[derive(Debug, Clone)]
pub struct ContractTest {
    scenario: Scenario,
}

impl ContractTest {
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    #[must_use]
    pub fn description(&self) -> String {
        self.scenario.test_description()
    }

    /// # Errors
    ///
    /// Propagates request generation errors.
    pub fn generate_request(&self) -> Result<HttpRequest, EngineError> {
        self.scenario.generate_http_request()
    }

    #[must_use]
    pub fn run(&self, executor: &dyn TestExecutor) -> TestOutcome {
        let description = self.description();
        let operation = self.scenario.request.operation();
        let request = match self.generate_request() {
            Ok(request) => request,
            Err(e) => {
                return TestOutcome {
                    operation,
                    ..TestOutcome::errored(description, e)
                };
            }
        };
        let response = match executor.execute(&request) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(test = %description, error = %e, "executor failed");
                return TestOutcome {
                    operation,
                    request: Some(request),
                    ..TestOutcome::errored(description, e)
                };
            }
        };
        let result = TestResult::from_match(self.scenario.matches_response(&response));
        tracing::debug!(test = %description, %result, status = response.status, "test finished");
        TestOutcome {
            description,
            operation,
            request: Some(request),
            response: Some(response),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::PathPattern;
    use crate::node::NumberNode;
    use crate::request::HttpRequestPattern;
    use crate::response::{HttpResponsePattern, ResponseStatus};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Fixed(Result<HttpResponse, u64>);

    impl TestExecutor for Fixed {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, ExecutorError> {
            self.0.clone().map_err(ExecutorError::Timeout)
        }
    }

    fn count_test() -> ContractTest {
        let path = PathPattern::from_template("/count", &BTreeMap::new()).unwrap();
        ContractTest::new(Scenario::new(
            "count",
            HttpRequestPattern::new("GET", path),
            HttpResponsePattern::new(ResponseStatus::Code(200)).with_body(Arc::new(NumberNode::integer())),
        ))
    }

    #[test]
    fn passing_response() {
        let outcome = count_test().run(&Fixed(Ok(HttpResponse::new(200).with_body(json!(3)))));
        assert_eq!(outcome.result, TestResult::Passed);
        assert_eq!(outcome.request.as_ref().unwrap().path, "/count");
        assert!(outcome.details().is_none());
    }

    #[test]
    fn failing_response_carries_report() {
        let outcome = count_test().run(&Fixed(Ok(HttpResponse::new(200).with_body(json!("three")))));
        assert!(matches!(outcome.result, TestResult::Failed(_)));
        assert!(outcome.details().unwrap().contains("RESPONSE.BODY"));
    }

    #[test]
    fn executor_error_is_reported() {
        let outcome = count_test().run(&Fixed(Err(5)));
        assert_eq!(outcome.result, TestResult::Errored("Request timed out after 5s".into()));
        assert!(outcome.request.is_some());
        assert!(outcome.response.is_none());
    }
}
