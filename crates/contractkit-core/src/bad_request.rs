//! Expectations for responses to deliberately invalid requests

use std::collections::BTreeMap;

use crate::http::HttpResponse;
use crate::resolver::Resolver;
use crate::response::HttpResponsePattern;
use crate::result::{Failure, FailureReason, MatchResult};

/// The 4xx responses an operation declares, plus its `default` response.
#[derive(Debug, Clone, Default)]
pub struct BadRequestOrDefault {
    by_status: BTreeMap<u16, HttpResponsePattern>,
    default: Option<HttpResponsePattern>,
}

impl BadRequestOrDefault {
    #[must_use]
    pub fn new(by_status: BTreeMap<u16, HttpResponsePattern>, default: Option<HttpResponsePattern>) -> Self {
        Self { by_status, default }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty() && self.default.is_none()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<u16> {
        self.by_status.keys().copied().collect()
    }

    /// A declared 4xx response matches fully; an undeclared 4xx falls back to
    /// `default` and counts as partial either way.
    #[must_use]
    pub fn matches(&self, response: &HttpResponse, resolver: &Resolver) -> MatchResult {
        if !(400..500).contains(&response.status) {
            return MatchResult::Failure(
                Failure::new(
                    resolver
                        .messages()
                        .mismatch("a 4xx status", &format!("status {}", response.status)),
                )
                .with_reason(FailureReason::StatusMismatch)
                .breadcrumb("STATUS")
                .breadcrumb("RESPONSE"),
            );
        }

        if let Some(pattern) = self.by_status.get(&response.status) {
            return pattern.matches(response, resolver);
        }

        match &self.default {
            Some(default) => match default.matches(response, resolver) {
                MatchResult::Success(_) => MatchResult::partial_success(format!(
                    "Status {} is not declared; the response matched the default response",
                    response.status
                )),
                MatchResult::Failure(f) => MatchResult::Failure(f.into_partial()),
            },
            None => MatchResult::Failure(
                Failure::new(format!(
                    "Status {} is not declared and there is no default response",
                    response.status
                ))
                .breadcrumb("STATUS")
                .breadcrumb("RESPONSE")
                .into_partial(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Field, ObjectNode, StringNode};
    use crate::response::ResponseStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn error_body() -> HttpResponsePattern {
        HttpResponsePattern::new(ResponseStatus::Code(400)).with_body(Arc::new(ObjectNode::new(BTreeMap::from([(
            "error".to_string(),
            Field::mandatory(Arc::new(StringNode::default())),
        )]))))
    }

    fn expectations() -> BadRequestOrDefault {
        BadRequestOrDefault::new(
            BTreeMap::from([(400, error_body())]),
            Some(HttpResponsePattern::new(ResponseStatus::Default)),
        )
    }

    #[test]
    fn non_client_error_fails() {
        let r = Resolver::new();
        let result = expectations().matches(&HttpResponse::new(200), &r);
        assert!(!result.is_acceptable());
        assert_eq!(result.as_failure().unwrap().reason, Some(FailureReason::StatusMismatch));
    }

    #[test]
    fn declared_status_uses_its_pattern() {
        let r = Resolver::new();
        let ok = HttpResponse::new(400).with_body(json!({"error": "bad"}));
        assert!(expectations().matches(&ok, &r).is_success());
        let wrong = HttpResponse::new(400).with_body(json!({"message": "bad"}));
        assert!(!expectations().matches(&wrong, &r).is_acceptable());
    }

    #[test]
    fn undeclared_status_falls_back_to_default() {
        let r = Resolver::new();
        let result = expectations().matches(&HttpResponse::new(422), &r);
        assert!(result.is_success());
        assert!(result.report().contains("default response"));
    }

    #[test]
    fn no_default_is_a_partial_failure() {
        let r = Resolver::new();
        let only_400 = BadRequestOrDefault::new(BTreeMap::from([(400, error_body())]), None);
        let result = only_400.matches(&HttpResponse::new(404), &r);
        assert!(!result.is_success());
        assert!(result.is_acceptable());
    }
}
