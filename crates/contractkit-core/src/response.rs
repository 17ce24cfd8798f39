//! Response patterns: what an operation may answer

use std::fmt;
use std::ops::ControlFlow;

use serde_json::Value;

use crate::error::EngineError;
use crate::facet::{FacetKind, KeyedPattern};
use crate::http::{CONTENT_TYPE, HttpResponse, media_type};
use crate::key_check::UnexpectedKeyCheck;
use crate::node::{ExactValue, Node};
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult};

/// Status an expectation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Code(u16),
    /// OpenAPI `default`: any status no other response declares
    Default,
    /// Any status at all
    Any,
    /// Any 4xx status
    ClientError,
}

impl ResponseStatus {
    #[must_use]
    pub fn accepts(self, status: u16) -> bool {
        match self {
            Self::Code(code) => code == status,
            Self::Default | Self::Any => true,
            Self::ClientError => (400..500).contains(&status),
        }
    }

    /// Status a generated response carries
    #[must_use]
    pub const fn generated(self) -> u16 {
        match self {
            Self::Code(code) => code,
            Self::Any => 200,
            Self::Default | Self::ClientError => 400,
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Code(200..=299))
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Default => write!(f, "default"),
            Self::Any => write!(f, "any status"),
            Self::ClientError => write!(f, "4xx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponsePattern {
    pub status: ResponseStatus,
    pub headers: KeyedPattern,
    /// `None`: any body is accepted
    pub body: Option<Node>,
    /// Exact body the response must carry, after the schema check
    pub exact_body: Option<Value>,
    pub content_type: Option<String>,
}

impl HttpResponsePattern {
    #[must_use]
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            headers: KeyedPattern::empty(FacetKind::Header),
            body: None,
            exact_body: None,
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: KeyedPattern) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Node) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_exact_body(mut self, body: Value) -> Self {
        self.exact_body = Some(body);
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Status, then headers, body and exact body. A wrong status ends the
    /// check; the rest accumulate. Breadcrumbed `RESPONSE`.
    #[must_use]
    pub fn matches(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        if let ControlFlow::Break(failure) = self.match_status(response, resolver) {
            return MatchResult::Failure(failure.breadcrumb("RESPONSE"));
        }
        let failures = self.match_headers(response, resolver, Vec::new());
        let failures = self.match_body(response, resolver, failures);
        let failures = self.match_exact(response, resolver, failures);
        Failure::result_of(failures).breadcrumb("RESPONSE")
    }

    fn match_status(&self, response: &HttpResponse, resolver: &Resolver) -> ControlFlow<Failure> {
        if self.status.accepts(response.status) {
            return ControlFlow::Continue(());
        }
        ControlFlow::Break(
            Failure::new(resolver.messages().mismatch(&format!("status {}", self.status), &format!("status {}", response.status)))
                .with_reason(FailureReason::StatusMismatch)
                .breadcrumb("STATUS"),
        )
    }

    fn match_headers(&self, response: &HttpResponse, resolver: &Resolver, mut failures: Vec<Failure>) -> Vec<Failure> {
        if let (Some(expected), Some(actual)) = (&self.content_type, response.content_type()) {
            if media_type(expected) != actual {
                failures.push(
                    Failure::new(resolver.messages().mismatch(expected, actual))
                        .with_reason(FailureReason::ContentTypeMismatch)
                        .breadcrumb(CONTENT_TYPE)
                        .breadcrumb("HEADER"),
                );
            }
        }
        // servers add headers of their own
        let lenient = resolver.with_key_policy(resolver.key_policy().with_unexpected(UnexpectedKeyCheck::Ignore));
        if let MatchResult::Failure(f) = self.headers.matches(&response.headers, &lenient) {
            failures.push(f.breadcrumb("HEADER"));
        }
        failures
    }

    fn match_body(&self, response: &HttpResponse, resolver: &Resolver, mut failures: Vec<Failure>) -> Vec<Failure> {
        if let Some(body) = &self.body {
            if let MatchResult::Failure(f) = resolver.at_root().matches(body.as_ref(), &response.body) {
                failures.push(f.breadcrumb("BODY"));
            }
        }
        failures
    }

    fn match_exact(&self, response: &HttpResponse, resolver: &Resolver, mut failures: Vec<Failure>) -> Vec<Failure> {
        if let Some(expected) = &self.exact_body {
            let exact = ExactValue::new(expected.clone());
            if let MatchResult::Failure(f) = resolver.at_root().matches(&exact, &response.body) {
                failures.push(f.breadcrumb("BODY"));
            }
        }
        failures
    }

    /// A concrete response for this pattern
    ///
    /// # Errors
    ///
    /// Propagates header and body generation errors.
    pub fn generate(&self, resolver: &Resolver) -> Result<HttpResponse, EngineError> {
        let mut response = HttpResponse::new(self.status.generated());
        response.headers = self.headers.generate(resolver)?;
        if let Some(content_type) = &self.content_type {
            response.headers.insert(CONTENT_TYPE.to_string(), content_type.clone());
        }
        response.body = match (&self.exact_body, &self.body) {
            (Some(exact), _) => exact.clone(),
            (None, Some(body)) => resolver.at_root().generate(body.as_ref())?,
            (None, None) => Value::Null,
        };
        Ok(response)
    }

    /// Every response `other` may produce is accepted here
    #[must_use]
    pub fn subsumes(&self, other: &HttpResponsePattern, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        let same_status = match (self.status, other.status) {
            (ResponseStatus::Any | ResponseStatus::Default, _) => true,
            (ResponseStatus::ClientError, ResponseStatus::Code(code)) => (400..500).contains(&code),
            (a, b) => a == b,
        };
        if !same_status {
            return MatchResult::Failure(
                Failure::new(mine.messages().mismatch(&self.status.to_string(), &other.status.to_string()))
                    .with_reason(FailureReason::StatusMismatch)
                    .breadcrumb("STATUS")
                    .breadcrumb("RESPONSE"),
            );
        }

        let mut failures = Vec::new();
        if let MatchResult::Failure(f) = self.headers.subsumes(&other.headers, mine, theirs) {
            failures.push(f.breadcrumb("HEADER"));
        }
        if let (Some(a), Some(b)) = (&self.body, &other.body) {
            if let MatchResult::Failure(f) = a.subsumes(b.as_ref(), &mine.at_root(), &theirs.at_root()) {
                failures.push(f.breadcrumb("BODY"));
            }
        }
        Failure::result_of(failures).breadcrumb("RESPONSE")
    }
}
