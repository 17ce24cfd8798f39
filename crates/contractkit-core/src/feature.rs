//! Features: the scenarios of one contract, tested and stubbed together

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bad_request::BadRequestOrDefault;
use crate::contract_test::{ContractTest, TestExecutor, TestOutcome};
use crate::error::EngineError;
use crate::http::{HttpRequest, HttpResponse};
use crate::node::LazySeq;
use crate::response::ResponseStatus;
use crate::result::{Failure, MatchResult, NoMatchingScenario, Results};
use crate::scenario::Scenario;
use crate::strategy::GenerationStrategy;
use crate::stub::{StubData, StubError, StubFile, StubRepository};

#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    #[must_use]
    pub fn new(name: impl Into<String>, scenarios: Vec<Scenario>) -> Self {
        Self {
            name: name.into(),
            scenarios,
        }
    }

    /// The 4xx and `default` responses declared by scenarios of the same
    /// operation, or `None` when there are none.
    #[must_use]
    pub fn bad_request_or_default(&self, scenario: &Scenario) -> Option<BadRequestOrDefault> {
        let mut by_status = BTreeMap::new();
        let mut default = None;
        for sibling in self
            .scenarios
            .iter()
            .filter(|s| s.request.same_operation(&scenario.request))
        {
            match sibling.status() {
                ResponseStatus::Code(code @ 400..=499) => {
                    by_status.entry(code).or_insert_with(|| sibling.response.clone());
                }
                ResponseStatus::Default => {
                    default.get_or_insert_with(|| sibling.response.clone());
                }
                _ => {}
            }
        }
        let expectations = BadRequestOrDefault::new(by_status, default);
        (!expectations.is_empty()).then_some(expectations)
    }

    /// Scenarios worth testing positively: every 2xx scenario, plus any
    /// scenario with examples.
    fn positive_scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios
            .iter()
            .filter(|s| s.status().is_success() || !s.examples.is_empty())
    }

    /// One negative scenario per operation, built from its first 2xx scenario
    fn negative_scenarios(&self) -> Vec<Scenario> {
        let mut seen: Vec<String> = Vec::new();
        let mut negatives = Vec::new();
        for scenario in self.scenarios.iter().filter(|s| s.status().is_success()) {
            let operation = scenario.request.operation();
            if seen.contains(&operation) {
                continue;
            }
            seen.push(operation);
            negatives.push(scenario.negative_based_on(self.bad_request_or_default(scenario)));
        }
        negatives
    }

    /// Positive tests for every testable scenario; a generative strategy adds
    /// negative tests per operation.
    #[must_use]
    pub fn generate_contract_tests(
        &self,
        strategy: Arc<dyn GenerationStrategy>,
    ) -> LazySeq<Result<ContractTest, EngineError>> {
        let mut sources: Vec<Scenario> = self.positive_scenarios().cloned().collect();
        if strategy.is_generative() {
            sources.extend(self.negative_scenarios());
        }
        Box::new(sources.into_iter().flat_map(move |scenario| {
            scenario
                .generate_test_scenarios(Arc::clone(&strategy))
                .map(|generated| generated.map(ContractTest::new))
        }))
    }

    /// Run every generated test. A generation error becomes an errored outcome
    /// and the run goes on.
    #[must_use]
    pub fn execute_tests(&self, executor: &dyn TestExecutor, strategy: Arc<dyn GenerationStrategy>) -> Vec<TestOutcome> {
        self.generate_contract_tests(strategy)
            .map(|test| match test {
                Ok(test) => test.run(executor),
                Err(e) => TestOutcome::errored(self.name.clone(), e),
            })
            .collect()
    }

    /// The first scenario that accepts the stub.
    ///
    /// # Errors
    ///
    /// [`NoMatchingScenario`] carrying the least fluffy failures.
    pub fn matching_stub(&self, request: &HttpRequest, response: &HttpResponse) -> Result<StubData, NoMatchingScenario> {
        let mut results = Results::default();
        for scenario in &self.scenarios {
            match scenario.matching_stub(request, response) {
                Ok(stub) => return Ok(stub),
                Err(failure) => results.push(MatchResult::Failure(failure)),
            }
        }
        Err(NoMatchingScenario::new(results.without_fluff(), request.to_string()))
    }

    /// # Errors
    ///
    /// See [`matching_stub`](Self::matching_stub).
    pub fn validate_stub(&self, stub: &StubFile) -> Result<StubData, NoMatchingScenario> {
        self.matching_stub(&stub.request, &stub.response)
    }

    fn request_results(&self, request: &HttpRequest) -> Vec<(&Scenario, MatchResult)> {
        self.scenarios
            .iter()
            .map(|s| (s, s.request.matches(request, &s.resolver())))
            .collect()
    }

    /// A generated response for each status some matching scenario declares;
    /// the first scenario per status wins.
    ///
    /// # Errors
    ///
    /// Propagates response generation errors.
    pub fn stub_response_map(&self, request: &HttpRequest) -> Result<BTreeMap<u16, HttpResponse>, EngineError> {
        let mut responses = BTreeMap::new();
        for (scenario, result) in self.request_results(request) {
            if !result.is_success() {
                continue;
            }
            let status = scenario.status().generated();
            if !responses.contains_key(&status) {
                responses.insert(status, scenario.generate_http_response(&BTreeMap::new())?);
            }
        }
        Ok(responses)
    }

    /// A response generated from the first matching scenario, preferring 2xx.
    ///
    /// # Errors
    ///
    /// [`StubError::NoMatch`] when no scenario accepts the request.
    pub fn generated_stub_response(&self, request: &HttpRequest) -> Result<HttpResponse, StubError> {
        let mut failures = Results::default();
        let mut fallback = None;
        for (scenario, result) in self.request_results(request) {
            if !result.is_success() {
                failures.push(result);
                continue;
            }
            if scenario.status().is_success() {
                return Ok(scenario.generate_http_response(&BTreeMap::new())?);
            }
            fallback.get_or_insert(scenario);
        }
        match fallback {
            Some(scenario) => Ok(scenario.generate_http_response(&BTreeMap::new())?),
            None => Err(NoMatchingScenario::new(failures.without_fluff(), request.to_string()).into()),
        }
    }

    /// An explicit stub if one matches, else a generated response.
    ///
    /// # Errors
    ///
    /// See [`generated_stub_response`](Self::generated_stub_response).
    pub fn stub_response(&self, request: &HttpRequest, stubs: &StubRepository) -> Result<HttpResponse, StubError> {
        if let Some(response) = stubs.response_for(request)? {
            return Ok(response);
        }
        tracing::debug!(%request, "no explicit stub, generating a response");
        self.generated_stub_response(request)
    }

    /// Whether every scenario of `older` is still served: some scenario here
    /// with the same method and status accepts every request the old one did
    /// and answers only what the old one allowed.
    #[must_use]
    pub fn backward_compatible_with(&self, older: &Feature) -> CompatibilityReport {
        let entries = older
            .scenarios
            .iter()
            .map(|old| {
                let mut results = Results::default();
                for new in self
                    .scenarios
                    .iter()
                    .filter(|s| s.request.method == old.request.method && s.status() == old.status())
                {
                    let (mine, theirs) = (new.resolver(), old.resolver());
                    let request = new.request.subsumes(&old.request, &mine, &theirs);
                    let response = old.response.subsumes(&new.response, &theirs, &mine);
                    let result = Failure::result_of(
                        [request, response]
                            .into_iter()
                            .filter_map(MatchResult::into_failure)
                            .collect(),
                    );
                    let done = result.is_success();
                    results.push(result);
                    if done {
                        break;
                    }
                }
                if results.is_empty() {
                    results.push(MatchResult::failure(format!(
                        "{} -> {} is missing from the newer contract",
                        old.request.operation(),
                        old.status()
                    )));
                }
                CompatibilityEntry {
                    scenario: old.test_description(),
                    results,
                }
            })
            .collect();
        CompatibilityReport { entries }
    }
}

#[derive(Debug, Clone)]
pub struct CompatibilityEntry {
    pub scenario: String,
    pub results: Results,
}

impl CompatibilityEntry {
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.results.has_success()
    }
}

/// Outcome of comparing an older contract with a newer one
#[derive(Debug, Clone, Default)]
pub struct CompatibilityReport {
    pub entries: Vec<CompatibilityEntry>,
}

impl CompatibilityReport {
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.entries.iter().all(CompatibilityEntry::is_compatible)
    }

    pub fn breaking(&self) -> impl Iterator<Item = &CompatibilityEntry> {
        self.entries.iter().filter(|e| !e.is_compatible())
    }
}

impl fmt::Display for CompatibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compatible() {
            return write!(f, "The newer contract is backward compatible");
        }
        let sections: Vec<String> = self
            .breaking()
            .map(|e| format!("In {}\n\n{}", e.scenario, e.results.without_fluff().distinct_report()))
            .collect();
        f.write_str(&sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::PathPattern;
    use crate::node::{Field, Node, NumberNode, ObjectNode, StringNode};
    use crate::request::HttpRequestPattern;
    use crate::response::HttpResponsePattern;
    use crate::strategy::{Generative, NonGenerative};
    use serde_json::json;

    fn object(fields: &[(&str, Node, bool)]) -> Node {
        Arc::new(ObjectNode::new(
            fields
                .iter()
                .map(|(name, node, optional)| {
                    let field = if *optional {
                        Field::optional(Arc::clone(node))
                    } else {
                        Field::mandatory(Arc::clone(node))
                    };
                    (name.to_string(), field)
                })
                .collect(),
        ))
    }

    fn create_pet(request_body: Node) -> Vec<Scenario> {
        let path = PathPattern::from_template("/pets", &BTreeMap::new()).unwrap();
        let request = HttpRequestPattern::new("POST", path).with_body(request_body);
        let created = HttpResponsePattern::new(ResponseStatus::Code(201))
            .with_body(object(&[("id", Arc::new(NumberNode::integer()), false)]));
        let invalid = HttpResponsePattern::new(ResponseStatus::Code(400))
            .with_body(object(&[("error", Arc::new(StringNode::default()), false)]));
        vec![
            Scenario::new("create pet", request.clone(), created),
            Scenario::new("reject pet", request.clone(), invalid),
            Scenario::new("fallback", request, HttpResponsePattern::new(ResponseStatus::Default)),
        ]
    }

    fn pets() -> Feature {
        Feature::new(
            "pets",
            create_pet(object(&[("name", Arc::new(StringNode::default()), false)])),
        )
    }

    #[test]
    fn siblings_supply_bad_request_expectations() {
        let feature = pets();
        let expectations = feature.bad_request_or_default(&feature.scenarios[0]).unwrap();
        assert_eq!(expectations.statuses(), vec![400]);
    }

    #[test]
    fn negative_tests_only_when_generative() {
        let feature = pets();
        let plain = feature.generate_contract_tests(Arc::new(NonGenerative)).count();
        assert_eq!(plain, 1);
        let tests: Vec<ContractTest> = feature
            .generate_contract_tests(Arc::new(Generative::new()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!tests[0].scenario().is_negative);
        let first_negative = tests.iter().position(|t| t.scenario().is_negative).unwrap();
        assert!(tests[first_negative..].iter().all(|t| t.scenario().is_negative));
        assert!(tests.iter().filter(|t| t.scenario().is_negative).all(|t| {
            t.scenario().bad_request_or_default.is_some() && t.scenario().response.status == ResponseStatus::ClientError
        }));
    }

    #[test]
    fn stub_validation_reports_meaningful_failures() {
        let feature = pets();
        let request = HttpRequest::new("POST", "/pets").with_body(json!({"name": 7}));
        let error = feature
            .matching_stub(&request, &HttpResponse::new(201).with_body(json!({"id": 1})))
            .unwrap_err();
        assert!(error.to_string().contains("REQUEST.BODY.name"));

        let good = HttpRequest::new("POST", "/pets").with_body(json!({"name": "Rex"}));
        let stub = feature
            .matching_stub(&good, &HttpResponse::new(201).with_body(json!({"id": 1})))
            .unwrap();
        assert_eq!(stub.scenario.as_deref(), Some("create pet"));
    }

    #[test]
    fn generated_stub_prefers_success() {
        let feature = pets();
        let request = HttpRequest::new("POST", "/pets").with_body(json!({"name": "Rex"}));
        let response = feature.stub_response(&request, &StubRepository::default()).unwrap();
        assert_eq!(response.status, 201);
        assert!(response.body["id"].is_i64());
        let map = feature.stub_response_map(&request).unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![201, 400]);
    }

    #[test]
    fn unmatched_stub_request_is_an_error() {
        let feature = pets();
        let request = HttpRequest::new("GET", "/pets");
        assert!(matches!(
            feature.stub_response(&request, &StubRepository::default()),
            Err(StubError::NoMatch(_))
        ));
    }

    #[test]
    fn new_mandatory_field_breaks_compatibility() {
        let older = pets();
        let newer = Feature::new(
            "pets",
            create_pet(object(&[
                ("name", Arc::new(StringNode::default()), false),
                ("tag", Arc::new(StringNode::default()), false),
            ])),
        );
        let report = newer.backward_compatible_with(&older);
        assert!(!report.is_compatible());
        assert!(report.to_string().contains("REQUEST.BODY.tag"));

        let relaxed = Feature::new(
            "pets",
            create_pet(object(&[
                ("name", Arc::new(StringNode::default()), false),
                ("tag", Arc::new(StringNode::default()), true),
            ])),
        );
        assert!(relaxed.backward_compatible_with(&older).is_compatible());
    }
}
