//! Stubs: canned responses keyed by request patterns

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dictionary::Dictionary;
use crate::error::{ContractError, EngineError};
use crate::facet::{FacetKind, KeyedPattern, PathPattern, PathSegment, keyed_of};
use crate::http::{HttpRequest, HttpResponse};
use crate::key_check::KeyPolicy;
use crate::node::Node;
use crate::request::HttpRequestPattern;
use crate::resolver::{Resolver, is_pattern_token};
use crate::result::{MatchResult, NoMatchingScenario};

/// A stub as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubFile {
    #[serde(rename = "http-request")]
    pub request: HttpRequest,
    #[serde(rename = "http-response")]
    pub response: HttpResponse,
}

impl StubFile {
    /// # Errors
    ///
    /// [`StubError::Io`] or [`StubError::Parse`].
    pub fn load(path: &Path) -> Result<Self, StubError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// # Errors
    ///
    /// [`StubError::Parse`] for malformed JSON or missing sections.
    pub fn from_json(text: &str) -> Result<Self, StubError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Error)]
pub enum StubError {
    #[error("Failed to read stub: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse stub: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    NoMatch(#[from] NoMatchingScenario),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A stub accepted by a scenario: the request shape it answers and what it
/// answers with. `(token)` values in the response are generated per call.
#[derive(Debug, Clone)]
pub struct StubData {
    pub request: HttpRequestPattern,
    pub response: HttpResponse,
    /// Scenario that validated the stub
    pub scenario: Option<String>,
    patterns: Arc<BTreeMap<String, Node>>,
    dictionary: Arc<Dictionary>,
}

impl StubData {
    /// Build the request pattern of a stub. Literal values match exactly;
    /// `(token)` values match any value of that type.
    ///
    /// # Errors
    ///
    /// [`ContractError::UnknownPattern`] for an unknown token.
    pub fn from_messages(
        request: &HttpRequest,
        response: HttpResponse,
        patterns: Arc<BTreeMap<String, Node>>,
    ) -> Result<Self, ContractError> {
        let resolver = Resolver::new().with_shared_patterns(Arc::clone(&patterns));
        let text_node = |text: &str| resolver.node_from_value(&Value::String(text.to_string()));

        let mut segments = Vec::new();
        for (index, segment) in request.path.split('/').filter(|s| !s.is_empty()).enumerate() {
            if is_pattern_token(segment) {
                segments.push(PathSegment::Param {
                    name: format!("segment{index}"),
                    node: text_node(segment)?,
                });
            } else {
                segments.push(PathSegment::Literal(segment.to_string()));
            }
        }

        let keyed = |kind: FacetKind, values: &BTreeMap<String, String>| -> Result<KeyedPattern, ContractError> {
            let params = values
                .iter()
                .map(|(k, v)| Ok((k.clone(), text_node(v)?)))
                .collect::<Result<Vec<_>, ContractError>>()?;
            Ok(keyed_of(kind, params))
        };

        let mut pattern = HttpRequestPattern::new(&request.method, PathPattern::from_segments(segments))
            .with_query(keyed(FacetKind::Query, &request.query)?)
            .with_headers(keyed(FacetKind::Header, &request.headers)?)
            .with_form_fields(keyed(FacetKind::FormField, &request.form_fields)?);
        if !request.body.is_null() {
            pattern = pattern.with_body(resolver.node_from_value(&request.body)?);
        }

        Ok(Self {
            request: pattern,
            response,
            scenario: None,
            patterns,
            dictionary: Arc::default(),
        })
    }

    #[must_use]
    pub fn with_scenario(mut self, name: impl Into<String>) -> Self {
        self.scenario = Some(name.into());
        self
    }

    /// Values for `(token)`s in the canned response, keyed by body path
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    fn resolver(&self) -> Resolver {
        Resolver::new()
            .with_shared_patterns(Arc::clone(&self.patterns))
            .with_dictionary(Arc::clone(&self.dictionary))
            .with_key_policy(KeyPolicy::extensible())
    }

    /// Undeclared keys in the incoming request are ignored: a stub names only
    /// what it cares about.
    #[must_use]
    pub fn matches(&self, request: &HttpRequest) -> MatchResult {
        self.request.matches(request, &self.resolver())
    }

    /// The canned response with every `(token)` replaced by a generated value
    ///
    /// # Errors
    ///
    /// An unknown token or a generation error.
    pub fn response(&self) -> Result<HttpResponse, EngineError> {
        let resolver = self.resolver().at_root();
        let node = resolver.node_from_value(&self.response.body)?;
        Ok(HttpResponse {
            body: resolver.generate(node.as_ref())?,
            ..self.response.clone()
        })
    }
}

/// Stubs in load order; the first match answers.
#[derive(Debug, Clone, Default)]
pub struct StubRepository {
    stubs: Vec<StubData>,
}

impl StubRepository {
    #[must_use]
    pub fn new(stubs: Vec<StubData>) -> Self {
        Self { stubs }
    }

    pub fn push(&mut self, stub: StubData) {
        self.stubs.push(stub);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// # Errors
    ///
    /// Generation errors of the matching stub's response.
    pub fn response_for(&self, request: &HttpRequest) -> Result<Option<HttpResponse>, EngineError> {
        for stub in &self.stubs {
            if stub.matches(request).is_success() {
                tracing::debug!(%request, scenario = ?stub.scenario, "stub matched");
                return stub.response().map(Some);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stub(body: Value, answer: Value) -> StubData {
        StubData::from_messages(
            &HttpRequest::new("POST", "/square").with_body(body),
            HttpResponse::new(200).with_body(answer),
            Arc::default(),
        )
        .unwrap()
    }

    #[test]
    fn parses_stub_file() {
        let file = StubFile::from_json(
            r#"{"http-request": {"method": "GET", "path": "/users/(number)"},
                "http-response": {"status": 200, "body": {"id": "(number)"}}}"#,
        )
        .unwrap();
        assert_eq!(file.request.path, "/users/(number)");
        let data = StubData::from_messages(&file.request, file.response, Arc::default()).unwrap();
        assert!(data.matches(&HttpRequest::new("GET", "/users/12")).is_success());
        assert!(!data.matches(&HttpRequest::new("GET", "/users/abc")).is_success());
        assert!(data.response().unwrap().body["id"].is_number());
    }

    #[test]
    fn first_matching_stub_answers() {
        let repo = StubRepository::new(vec![
            stub(json!({"number": "(number)"}), json!(1)),
            stub(json!({"number": "(null)"}), json!(2)),
        ]);
        let ten = HttpRequest::new("POST", "/square").with_body(json!({"number": 10}));
        let null = HttpRequest::new("POST", "/square").with_body(json!({"number": null}));
        assert_eq!(repo.response_for(&ten).unwrap().unwrap().body, json!(1));
        assert_eq!(repo.response_for(&null).unwrap().unwrap().body, json!(2));
        let text = HttpRequest::new("POST", "/square").with_body(json!({"number": "x"}));
        assert!(repo.response_for(&text).unwrap().is_none());
    }

    #[test]
    fn response_tokens_prefer_dictionary_values() {
        let dictionary = Dictionary::from_json(r#"{"status": "open", "items[*].sku": "ABC-1"}"#).unwrap();
        let data = StubData::from_messages(
            &HttpRequest::new("GET", "/orders"),
            HttpResponse::new(200).with_body(json!({"status": "(string)", "items": [{"sku": "(string)"}], "note": "(string)"})),
            Arc::default(),
        )
        .unwrap()
        .with_dictionary(Arc::new(dictionary));
        let body = data.response().unwrap().body;
        assert_eq!(body["status"], "open");
        assert_eq!(body["items"][0]["sku"], "ABC-1");
        assert!(body["note"].is_string());
    }

    #[test]
    fn unknown_token_is_rejected() {
        let result = StubData::from_messages(
            &HttpRequest::new("POST", "/square").with_body(json!({"n": "(Nope)"})),
            HttpResponse::new(200),
            Arc::default(),
        );
        assert!(matches!(result, Err(ContractError::UnknownPattern(_))));
    }
}
