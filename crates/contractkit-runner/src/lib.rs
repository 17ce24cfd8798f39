//! contractkit-runner: loads OpenAPI contracts and runs them against servers
//!
//! [`ContractRunner`] ties a [`Config`] to the [`Feature`] loaded from its
//! spec: it plans tests, executes them through [`HttpExecutor`] (or any other
//! [`TestExecutor`]) and validates stub files.

pub mod executor;
pub mod openapi;

use std::path::PathBuf;
use std::sync::Arc;

use contractkit_core::plan::TestPlan;
use contractkit_core::{
    Config, ContractError, ContractTest, Dictionary, EngineError, Feature, GenerationStrategy,
    HttpRequest, StubFile, TestExecutor, TestOutcome,
};

pub use executor::HttpExecutor;
pub use openapi::{OpenApiLoader, parse_spec};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Outcome of validating one stub file against the contract
#[derive(Debug, Clone)]
pub struct StubCheck {
    pub path: PathBuf,
    /// The stub's request, when the file could be read
    pub request: Option<HttpRequest>,
    /// Name of the accepting scenario, or why no scenario accepted it
    pub result: Result<String, String>,
}

impl StubCheck {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }
}

/// Contract test runner for one configured spec
pub struct ContractRunner {
    config: Config,
    feature: Feature,
}

impl ContractRunner {
    /// Load the configured spec and dictionary.
    ///
    /// # Errors
    ///
    /// [`RunnerError::Contract`] for an unreadable dictionary, otherwise as
    /// [`OpenApiLoader::load`].
    pub fn from_config(config: &Config) -> Result<Self, RunnerError> {
        let dictionary = match &config.dictionary {
            Some(path) => Dictionary::load(path)?,
            None => Dictionary::default(),
        };
        let feature = OpenApiLoader::new()
            .with_settings(config.match_settings())
            .with_dictionary(Arc::new(dictionary))
            .load(&config.spec)?;
        tracing::info!(
            spec = %config.spec.display(),
            scenarios = feature.scenarios.len(),
            "contract loaded"
        );
        Ok(Self::with_feature(config.clone(), feature))
    }

    #[must_use]
    pub fn with_feature(config: Config, feature: Feature) -> Self {
        Self { config, feature }
    }

    #[must_use]
    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn strategy(&self) -> Arc<dyn GenerationStrategy> {
        self.config.strategy()
    }

    /// # Errors
    ///
    /// Propagates test generation errors.
    pub fn plan(&self) -> Result<TestPlan, RunnerError> {
        Ok(TestPlan::build(&self.feature, self.strategy(), &self.config)?)
    }

    /// Generated tests, capped at `max_tests`
    pub fn tests(&self) -> impl Iterator<Item = Result<ContractTest, EngineError>> {
        self.feature
            .generate_contract_tests(self.strategy())
            .take(self.config.max_tests.unwrap_or(usize::MAX))
    }

    /// Run against the configured base URL.
    ///
    /// # Errors
    ///
    /// [`RunnerError::Http`] if the HTTP client cannot be built.
    pub fn run(&self) -> Result<Vec<TestOutcome>, RunnerError> {
        let executor = HttpExecutor::new(&self.config.base_url, self.config.headers.clone(), self.config.timeout_secs)?;
        Ok(self.run_with(&executor))
    }

    /// Run every test through `executor`. A test that cannot be generated is
    /// recorded as errored and the run goes on.
    #[must_use]
    pub fn run_with(&self, executor: &dyn TestExecutor) -> Vec<TestOutcome> {
        let mut outcomes = Vec::new();
        for test in self.tests() {
            let outcome = match test {
                Ok(test) => test.run(executor),
                Err(e) => TestOutcome::errored(self.feature.name.clone(), e),
            };
            tracing::info!(test = %outcome.description, result = %outcome.result, "test finished");
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Validate every configured stub file.
    #[must_use]
    pub fn check_stubs(&self) -> Vec<StubCheck> {
        self.config
            .stubs
            .iter()
            .map(|path| {
                let stub = match StubFile::load(path) {
                    Ok(stub) => stub,
                    Err(e) => {
                        return StubCheck {
                            path: path.clone(),
                            request: None,
                            result: Err(e.to_string()),
                        };
                    }
                };
                let result = self
                    .feature
                    .validate_stub(&stub)
                    .map(|data| data.scenario.unwrap_or_default())
                    .map_err(|e| e.to_string());
                if let Err(reason) = &result {
                    tracing::warn!(stub = %path.display(), %reason, "stub rejected");
                }
                StubCheck {
                    path: path.clone(),
                    request: Some(stub.request),
                    result,
                }
            })
            .collect()
    }
}
