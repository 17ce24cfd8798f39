//! Test plan types and config validation
//!
//! Describes which contract tests *would* run without sending any requests.
//! Used for pre-flight validation and CI previews.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::error::EngineError;
use crate::feature::Feature;
use crate::strategy::GenerationStrategy;

// ── Plan types ──

/// Complete test plan: the tests per operation, and config warnings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestPlan {
    /// Per-operation test counts
    pub operations: Vec<OperationPlan>,
    /// Every test that would run, in run order
    pub tests: Vec<PlannedTest>,
    /// Config/spec validation results
    pub validations: Vec<Validation>,
}

/// Test counts for a single operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationPlan {
    /// Operation label, e.g. "POST /api/users"
    pub operation: String,
    pub positive: u32,
    pub negative: u32,
    /// Path, query and header parameter names
    pub parameters: Vec<String>,
}

/// One contract test.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedTest {
    pub description: String,
    pub operation: String,
    /// Expected status, e.g. "200" or "4xx"
    pub status: String,
    pub negative: bool,
    /// Example row the test was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl Validation {
    fn new(check: &str, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
        }
    }
}

impl TestPlan {
    /// Generate (but do not run) the tests of `feature`, capped at
    /// `config.max_tests`.
    ///
    /// # Errors
    ///
    /// Propagates test generation errors.
    pub fn build(feature: &Feature, strategy: Arc<dyn GenerationStrategy>, config: &Config) -> Result<Self, EngineError> {
        let mut operations: Vec<OperationPlan> = Vec::new();
        let mut tests = Vec::new();
        let limit = config.max_tests.unwrap_or(usize::MAX);

        for test in feature.generate_contract_tests(strategy).take(limit) {
            let test = test?;
            let scenario = test.scenario();
            let operation = scenario.request.operation();

            let index = match operations.iter().position(|o| o.operation == operation) {
                Some(index) => index,
                None => {
                    operations.push(OperationPlan {
                        operation: operation.clone(),
                        positive: 0,
                        negative: 0,
                        parameters: parameter_names(scenario),
                    });
                    operations.len() - 1
                }
            };
            if scenario.is_negative {
                operations[index].negative += 1;
            } else {
                operations[index].positive += 1;
            }

            tests.push(PlannedTest {
                description: test.description(),
                operation,
                status: scenario.status().to_string(),
                negative: scenario.is_negative,
                example: scenario.row.as_ref().map(|row| row.name.clone()),
            });
        }

        Ok(Self {
            operations,
            tests,
            validations: validate_config(config),
        })
    }
}

fn parameter_names(scenario: &crate::scenario::Scenario) -> Vec<String> {
    let request = &scenario.request;
    request
        .path
        .param_names()
        .map(str::to_string)
        .chain(request.query.params().keys().cloned())
        .chain(request.headers.params().keys().cloned())
        .collect()
}

// ── Config validation ──

/// Patterns that suggest a placeholder value rather than a real credential.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-token",
    "your_token",
    "YOUR_TOKEN",
    "your-api-key",
    "YOUR_API_KEY",
    "CHANGEME",
    "changeme",
    "placeholder",
    "xxx",
    "XXX",
    "replace-me",
    "REPLACE_ME",
];

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    if config.spec.exists() {
        checks.push(Validation::new(
            "spec",
            ValidationStatus::Ok,
            format!("spec: {} (exists)", config.spec.display()),
        ));
    } else {
        checks.push(Validation::new(
            "spec",
            ValidationStatus::Error,
            format!("spec: {} (not found)", config.spec.display()),
        ));
    }

    if config.base_url.starts_with("http://") || config.base_url.starts_with("https://") {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Ok,
            format!("base_url: {}", config.base_url),
        ));
    } else {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Warning,
            format!("base_url: {} (missing http:// or https:// prefix)", config.base_url),
        ));
    }

    let mut header_issues = Vec::new();
    for (key, value) in &config.headers {
        if value.contains('<') && value.contains('>') {
            header_issues.push(format!("{key}: contains '<...>' placeholder"));
        } else if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| value.contains(*p)) {
            header_issues.push(format!("{key}: contains '{pattern}', may be a placeholder"));
        }
    }
    if header_issues.is_empty() {
        checks.push(Validation::new(
            "headers",
            ValidationStatus::Ok,
            format!("headers: {} configured", config.headers.len()),
        ));
    } else {
        checks.extend(
            header_issues
                .into_iter()
                .map(|issue| Validation::new("headers", ValidationStatus::Warning, issue)),
        );
    }

    if let Some(dictionary) = &config.dictionary {
        let status = if dictionary.exists() {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Error
        };
        checks.push(Validation::new(
            "dictionary",
            status,
            format!("dictionary: {}", dictionary.display()),
        ));
    }

    for stub in config.stubs.iter().filter(|s| !s.exists()) {
        checks.push(Validation::new(
            "stubs",
            ValidationStatus::Warning,
            format!("stub: {} (not found)", stub.display()),
        ));
    }

    checks
}

// ── Display helpers ──

impl TestPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Test plan: {} operations, {} tests\n",
            self.operations.len(),
            self.tests.len(),
        ));

        for op in &self.operations {
            lines.push(format!(
                "{} ({} positive, {} negative):",
                op.operation, op.positive, op.negative
            ));
            if !op.parameters.is_empty() {
                lines.push(format!("  Parameters: {}", op.parameters.join(", ")));
            }
            for test in self.tests.iter().filter(|t| t.operation == op.operation) {
                lines.push(format!("  - {}", test.description));
            }
            lines.push(String::new());
        }

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_with_headers(headers: HashMap<String, String>) -> Config {
        Config {
            spec: PathBuf::from("nonexistent.yaml"),
            headers,
            ..Config::default()
        }
    }

    #[test]
    fn validate_placeholder_angle_brackets() {
        let mut h = HashMap::new();
        h.insert("Authorization".into(), "Bearer <your-token-here>".into());
        let checks = validate_config(&config_with_headers(h));
        assert!(
            checks
                .iter()
                .any(|c| c.check == "headers" && c.status == ValidationStatus::Warning)
        );
    }

    #[test]
    fn validate_placeholder_pattern() {
        let mut h = HashMap::new();
        h.insert("X-API-Key".into(), "YOUR_TOKEN_HERE".into());
        let checks = validate_config(&config_with_headers(h));
        assert!(
            checks
                .iter()
                .any(|c| c.check == "headers" && c.status == ValidationStatus::Warning)
        );
    }

    #[test]
    fn validate_real_token_no_warning() {
        let mut h = HashMap::new();
        h.insert(
            "Authorization".into(),
            "Bearer eyJhbGciOiJIUzI1NiJ9.abc.xyz".into(),
        );
        let checks = validate_config(&config_with_headers(h));
        let header_checks: Vec<_> = checks.iter().filter(|c| c.check == "headers").collect();
        assert_eq!(header_checks.len(), 1);
        assert_eq!(header_checks[0].status, ValidationStatus::Ok);
    }

    #[test]
    fn validate_spec_and_dictionary_missing() {
        let cfg = Config {
            dictionary: Some(PathBuf::from("missing-dictionary.json")),
            ..config_with_headers(HashMap::new())
        };
        let checks = validate_config(&cfg);
        let spec = checks.iter().find(|c| c.check == "spec").unwrap();
        assert_eq!(spec.status, ValidationStatus::Error);
        let dictionary = checks.iter().find(|c| c.check == "dictionary").unwrap();
        assert_eq!(dictionary.status, ValidationStatus::Error);
    }

    #[test]
    fn validate_bad_base_url() {
        let cfg = Config {
            base_url: "localhost:8080".into(),
            ..config_with_headers(HashMap::new())
        };
        let checks = validate_config(&cfg);
        let url_check = checks.iter().find(|c| c.check == "base_url").unwrap();
        assert_eq!(url_check.status, ValidationStatus::Warning);
    }

    #[test]
    fn plan_terminal_output() {
        let plan = TestPlan {
            operations: vec![OperationPlan {
                operation: "POST /users".into(),
                positive: 2,
                negative: 1,
                parameters: vec!["X-Trace".into()],
            }],
            tests: vec![PlannedTest {
                description: "Scenario: create user (POST /users -> 201)".into(),
                operation: "POST /users".into(),
                status: "201".into(),
                negative: false,
                example: None,
            }],
            validations: vec![Validation::new("spec", ValidationStatus::Ok, "spec: openapi.yaml (exists)")],
        };

        let text = plan.to_terminal();
        assert!(text.contains("1 operations, 1 tests"));
        assert!(text.contains("POST /users (2 positive, 1 negative)"));
        assert!(text.contains("Parameters: X-Trace"));
        assert!(text.contains("  - Scenario: create user"));
        assert!(text.contains("[OK] spec: openapi.yaml (exists)"));
        assert!(!plan.has_errors());
    }

    #[test]
    fn plan_has_errors() {
        let plan = TestPlan {
            operations: vec![],
            tests: vec![],
            validations: vec![Validation::new("spec", ValidationStatus::Error, "not found")],
        };
        assert!(plan.has_errors());
        assert!(!plan.has_warnings());
    }
}
