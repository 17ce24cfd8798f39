//! contractkit-core: schema matching and test generation for API contracts
//!
//! A [`Feature`] holds the [`Scenario`]s of one contract. Scenarios match
//! requests and responses through immutable [`Resolver`] contexts, generate
//! contract tests under a [`GenerationStrategy`], and validate stubs.
//! Failures carry breadcrumbs and a fluff level so that, when many candidates
//! reject one input, only the most meaningful mismatches are shown.

pub mod bad_request;
pub mod config;
pub mod contract_test;
pub mod convergence;
pub mod dictionary;
pub mod error;
pub mod facet;
pub mod feature;
pub mod http;
pub mod key_check;
pub mod mismatch;
pub mod node;
pub mod plan;
pub mod report;
pub mod request;
pub mod resolver;
pub mod response;
pub mod result;
pub mod row;
pub mod scenario;
pub mod strategy;
pub mod stub;
pub mod verdict;

pub use bad_request::BadRequestOrDefault;
pub use config::{Config, ConfigError};
pub use contract_test::{ContractTest, ExecutorError, TestExecutor, TestOutcome, TestResult};
pub use convergence::converge_paths;
pub use dictionary::Dictionary;
pub use error::{ContractError, EngineError};
pub use feature::{CompatibilityReport, Feature};
pub use http::{HttpRequest, HttpResponse, MultipartPart};
pub use key_check::KeyPolicy;
pub use mismatch::{ContractMismatchMessages, DefaultMismatchMessages, MismatchMessages, StubMismatchMessages};
pub use node::{LazySeq, Node, SchemaNode};
pub use plan::TestPlan;
pub use report::RunReport;
pub use request::HttpRequestPattern;
pub use resolver::Resolver;
pub use response::{HttpResponsePattern, ResponseStatus};
pub use result::{Failure, FailureReason, MatchResult, NoMatchingScenario, Results};
pub use row::{Examples, Row};
pub use scenario::{MatchSettings, Scenario};
pub use strategy::{GenerationStrategy, Generative, NonGenerative};
pub use stub::{StubData, StubError, StubFile, StubRepository};
pub use verdict::{TestCounts, Verdict, VerdictPolicy, VerdictStatus};
