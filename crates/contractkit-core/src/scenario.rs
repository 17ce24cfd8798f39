//! Scenarios: one operation of a contract with its expectations

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::bad_request::BadRequestOrDefault;
use crate::dictionary::Dictionary;
use crate::error::EngineError;
use crate::http::{HttpRequest, HttpResponse};
use crate::key_check::KeyPolicy;
use crate::mismatch::{ContractMismatchMessages, StubMismatchMessages};
use crate::node::{LazySeq, Node};
use crate::request::HttpRequestPattern;
use crate::resolver::{Resolver, is_pattern_token};
use crate::response::{HttpResponsePattern, ResponseStatus};
use crate::result::{Failure, MatchResult};
use crate::row::{Examples, Row};
use crate::strategy::GenerationStrategy;
use crate::stub::StubData;

/// Resolver knobs a scenario evaluates under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSettings {
    /// Undeclared keys are ignored instead of rejected
    pub extensible_schema: bool,
    /// Lookup-path cycle guard instead of the identity count
    pub all_patterns_mandatory: bool,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub request: HttpRequestPattern,
    pub response: HttpResponsePattern,
    /// Server state the scenario assumes
    pub expected_facts: BTreeMap<String, Value>,
    pub examples: Examples,
    /// Named setup values, visible to generation as facts
    pub fixtures: BTreeMap<String, Value>,
    pub patterns: Arc<BTreeMap<String, Node>>,
    pub dictionary: Arc<Dictionary>,
    pub settings: MatchSettings,
    pub is_negative: bool,
    pub bad_request_or_default: Option<Arc<BadRequestOrDefault>>,
    /// Example row this copy was specialized for
    pub row: Option<Row>,
}

impl Scenario {
    #[must_use]
    pub fn new(name: impl Into<String>, request: HttpRequestPattern, response: HttpResponsePattern) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            expected_facts: BTreeMap::new(),
            examples: Examples::default(),
            fixtures: BTreeMap::new(),
            patterns: Arc::default(),
            dictionary: Arc::default(),
            settings: MatchSettings::default(),
            is_negative: false,
            bad_request_or_default: None,
            row: None,
        }
    }

    #[must_use]
    pub fn with_expected_facts(mut self, facts: BTreeMap<String, Value>) -> Self {
        self.expected_facts = facts;
        self
    }

    #[must_use]
    pub fn with_examples(mut self, examples: Examples) -> Self {
        self.examples = examples;
        self
    }

    #[must_use]
    pub fn with_fixtures(mut self, fixtures: BTreeMap<String, Value>) -> Self {
        self.fixtures = fixtures;
        self
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: Arc<BTreeMap<String, Node>>) -> Self {
        self.patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        self.response.status
    }

    /// Base resolver for this scenario
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        let key_policy = if self.settings.extensible_schema {
            KeyPolicy::extensible()
        } else {
            KeyPolicy::strict()
        };
        Resolver::new()
            .with_shared_patterns(Arc::clone(&self.patterns))
            .with_dictionary(Arc::clone(&self.dictionary))
            .with_key_policy(key_policy)
            .with_all_patterns_mandatory(self.settings.all_patterns_mandatory)
    }

    /// Facts must cover exactly the expected keys; each value matches
    /// literally or, for a `(token)`, by type. Then the request pipeline runs.
    #[must_use]
    pub fn matches_request(&self, request: &HttpRequest, facts: &BTreeMap<String, Value>) -> MatchResult {
        let resolver = self.resolver();
        if let MatchResult::Failure(f) = self.match_facts(facts, &resolver) {
            return MatchResult::Failure(f);
        }
        self.request.matches(request, &resolver.with_facts(facts.clone()))
    }

    fn match_facts(&self, facts: &BTreeMap<String, Value>, resolver: &Resolver) -> MatchResult {
        let mut failures = Vec::new();
        for name in self.expected_facts.keys() {
            if !facts.contains_key(name) {
                failures.push(Failure::new(resolver.messages().missing_key("fact", name)).breadcrumb(name.as_str()));
            }
        }
        for (name, actual) in facts {
            let Some(expected) = self.expected_facts.get(name) else {
                failures.push(Failure::new(resolver.messages().unexpected_key("fact", name)).breadcrumb(name.as_str()));
                continue;
            };
            let result = match resolver.node_from_value(expected) {
                Ok(node) => resolver.matches(node.as_ref(), actual),
                Err(e) => MatchResult::failure(e.to_string()),
            };
            if let MatchResult::Failure(f) = result {
                failures.push(f.breadcrumb(name.as_str()));
            }
        }
        Failure::result_of(failures).breadcrumb("FACTS")
    }

    /// Negative scenarios are judged by their 4xx expectations when present
    #[must_use]
    pub fn matches_response(&self, response: &HttpResponse) -> MatchResult {
        let resolver = self.resolver().with_messages(Arc::new(ContractMismatchMessages));
        match (&self.bad_request_or_default, self.is_negative) {
            (Some(bad_request), true) => bad_request.matches(response, &resolver),
            _ => self.response.matches(response, &resolver),
        }
    }

    fn generation_facts(&self) -> BTreeMap<String, Value> {
        let mut facts = self.fixtures.clone();
        facts.extend(
            self.expected_facts
                .iter()
                .filter(|(_, v)| !matches!(v, Value::String(s) if is_pattern_token(s)))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        facts
    }

    /// # Errors
    ///
    /// Propagates request generation errors.
    pub fn generate_http_request(&self) -> Result<HttpRequest, EngineError> {
        self.request
            .generate(&self.resolver().with_facts(self.generation_facts()))
    }

    /// Response built with the expected facts, overridden by `actual` facts
    /// where the expectation is a `(token)` the actual value satisfies or
    /// where nothing was expected.
    ///
    /// # Errors
    ///
    /// Propagates response generation errors.
    pub fn generate_http_response(&self, actual: &BTreeMap<String, Value>) -> Result<HttpResponse, EngineError> {
        let resolver = self.resolver();
        let mut merged = self.expected_facts.clone();
        for (name, value) in actual {
            let take_actual = match self.expected_facts.get(name) {
                None => true,
                Some(Value::String(token)) if is_pattern_token(token) => match resolver.pattern_for_token(token) {
                    Some(Ok(node)) => resolver.matches(node.as_ref(), value).is_success(),
                    _ => false,
                },
                Some(_) => false,
            };
            if take_actual {
                merged.insert(name.clone(), value.clone());
            }
        }
        self.response.generate(&resolver.with_facts(merged))
    }

    /// Specialized copies of this scenario: per example row, per positive
    /// variant, or per negative variant for a negative scenario.
    #[must_use]
    pub fn generate_test_scenarios(&self, strategy: Arc<dyn GenerationStrategy>) -> LazySeq<Result<Scenario, EngineError>> {
        let this = self.clone();
        let resolver = self
            .resolver()
            .with_strategy(strategy)
            .with_facts(self.generation_facts());
        Box::new(self.examples.rows_or_empty().into_iter().flat_map(move |row| {
            let variants = if this.is_negative {
                this.request.negative_based_on(&row, &resolver)
            } else {
                this.request.new_based_on(&row, &resolver)
            };
            let this = this.clone();
            variants.map(move |variant| {
                variant.map(|request| Scenario {
                    request,
                    row: (!row.is_empty()).then(|| row.clone()),
                    ..this.clone()
                })
            })
        }))
    }

    /// This scenario turned into its negative counterpart: invalid requests
    /// answered with a 4xx.
    #[must_use]
    pub fn negative_based_on(&self, bad_request_or_default: Option<BadRequestOrDefault>) -> Scenario {
        Scenario {
            response: HttpResponsePattern::new(ResponseStatus::ClientError),
            is_negative: true,
            bad_request_or_default: bad_request_or_default.map(Arc::new),
            ..self.clone()
        }
    }

    /// Validate a stub against this scenario. Stub values may be `(token)`s,
    /// accepted where the declared type covers the token's type.
    ///
    /// # Errors
    ///
    /// The failure explaining why the stub does not fit.
    pub fn matching_stub(&self, request: &HttpRequest, response: &HttpResponse) -> Result<StubData, Failure> {
        let resolver = self
            .resolver()
            .with_mock(true)
            .with_messages(Arc::new(StubMismatchMessages));

        let request_result = self.request.matches(request, &resolver);
        let response_result = self.response.matches(response, &resolver);
        if let Some(failure) = Failure::merge(
            [request_result, response_result]
                .into_iter()
                .filter_map(MatchResult::into_failure)
                .collect(),
        ) {
            return Err(failure);
        }

        StubData::from_messages(request, response.clone(), Arc::clone(&self.patterns))
            .map(|stub| stub.with_scenario(&self.name).with_dictionary(Arc::clone(&self.dictionary)))
            .map_err(|e| Failure::new(e.to_string()))
    }

    /// `Scenario: <name>`, tagged with the example row and polarity
    #[must_use]
    pub fn test_description(&self) -> String {
        let operation = format!("{} -> {}", self.request.operation(), self.response.status);
        let mut description = if self.name.is_empty() {
            format!("Scenario: {operation}")
        } else {
            format!("Scenario: {} ({operation})", self.name)
        };
        if let Some(row) = &self.row {
            if !row.name.is_empty() {
                description.push_str(&format!(" | EX:{}", row.name));
            }
        }
        if self.is_negative {
            description.push_str(" [-ve]");
        }
        description
    }
}
