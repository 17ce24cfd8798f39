//! Machine-readable run report
//!
//! The JSON written by `contractkit test --output json`. Its JSON Schema is
//! exported by `contractkit schema`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contract_test::{TestOutcome, TestResult};
use crate::verdict::{TestCounts, Verdict, VerdictStatus};

/// Top-level report of one contract test run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub verdict: VerdictStatus,
    pub reason: String,
    pub counts: TestCounts,
    /// Per-operation counts, in first-run order
    pub operations: Vec<OperationSummary>,
    pub tests: Vec<TestRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationSummary {
    /// Operation label, e.g. "POST /api/users"
    pub operation: String,
    pub counts: TestCounts,
}

/// Outcome of a single test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestRecord {
    pub description: String,
    pub operation: String,
    pub result: RecordResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request path with query string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure report, partial-success note or error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordResult {
    Passed,
    Partial,
    Failed,
    Errored,
}

impl From<&TestResult> for RecordResult {
    fn from(result: &TestResult) -> Self {
        match result {
            TestResult::Passed => Self::Passed,
            TestResult::PartiallyPassed(_) => Self::Partial,
            TestResult::Failed(_) => Self::Failed,
            TestResult::Errored(_) => Self::Errored,
        }
    }
}

impl TestRecord {
    #[must_use]
    pub fn from_outcome(outcome: &TestOutcome) -> Self {
        Self {
            description: outcome.description.clone(),
            operation: outcome.operation.clone(),
            result: RecordResult::from(&outcome.result),
            method: outcome.request.as_ref().map(|r| r.method.clone()),
            path: outcome.request.as_ref().map(crate::http::HttpRequest::path_and_query),
            status: outcome.response.as_ref().map(|r| r.status),
            details: outcome.details(),
        }
    }
}

impl RunReport {
    #[must_use]
    pub fn new(outcomes: &[TestOutcome], verdict: &Verdict) -> Self {
        let mut operations: Vec<(String, Vec<TestOutcome>)> = Vec::new();
        for outcome in outcomes {
            match operations.iter_mut().find(|(op, _)| *op == outcome.operation) {
                Some((_, group)) => group.push(outcome.clone()),
                None => operations.push((outcome.operation.clone(), vec![outcome.clone()])),
            }
        }
        Self {
            verdict: verdict.status,
            reason: verdict.reason.clone(),
            counts: verdict.counts,
            operations: operations
                .into_iter()
                .map(|(operation, group)| OperationSummary {
                    operation,
                    counts: TestCounts::tally(&group),
                })
                .collect(),
            tests: outcomes.iter().map(TestRecord::from_outcome).collect(),
        }
    }
}

/// Generate JSON Schema for the run report.
///
/// # Errors
///
/// Serialization of the schema document.
pub fn generate_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RunReport);
    serde_json::to_string_pretty(&schema)
}
