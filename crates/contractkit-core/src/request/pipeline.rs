//! Staged request matching
//!
//! Each stage inspects one facet. `Break` ends the pipeline with that failure
//! alone; `Continue` hands the (possibly trimmed) request to the next stage
//! along with the failures collected so far.

use std::ops::ControlFlow;

use super::HttpRequestPattern;
use super::multipart::match_parts;
use crate::facet::match_security;
use crate::http::{HttpRequest, media_type};
use crate::node::value_to_text;
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult};

struct MatchState<'a> {
    request: HttpRequest,
    resolver: &'a Resolver,
    failures: Vec<Failure>,
}

impl MatchState<'_> {
    fn soft(mut self, result: MatchResult, wrap: impl FnOnce(Failure) -> Failure) -> Self {
        if let MatchResult::Failure(f) = result {
            self.failures.push(wrap(f));
        }
        self
    }
}

type Stage = for<'a> fn(&HttpRequestPattern, MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>>;

const STAGES: [Stage; 9] = [
    match_path,
    match_method,
    match_security_stage,
    match_query,
    match_headers,
    match_form_fields,
    match_multipart,
    match_body,
    match_body_regex,
];

pub(super) fn run(pattern: &HttpRequestPattern, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
    let mut state = MatchState {
        request: request.clone(),
        resolver,
        failures: Vec::new(),
    };
    for stage in STAGES {
        match stage(pattern, state) {
            ControlFlow::Continue(next) => state = next,
            ControlFlow::Break(failure) => {
                tracing::debug!(operation = %pattern.operation(), %request, "request rejected early");
                return MatchResult::Failure(failure.breadcrumb("REQUEST"));
            }
        }
    }
    Failure::result_of(state.failures).breadcrumb("REQUEST")
}

fn match_path<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    match pattern.path.matches(&state.request.path, state.resolver) {
        MatchResult::Success(_) => ControlFlow::Continue(state),
        MatchResult::Failure(f) => ControlFlow::Break(f.breadcrumb(format!("PATH ({})", state.request.path))),
    }
}

fn match_method<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    if pattern.method.eq_ignore_ascii_case(&state.request.method) {
        return ControlFlow::Continue(state);
    }
    ControlFlow::Break(
        Failure::new(state.resolver.messages().mismatch(&pattern.method, &state.request.method))
            .with_reason(FailureReason::MethodMismatch)
            .breadcrumb("METHOD"),
    )
}

fn match_security_stage<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    // stubs do not carry credentials
    if state.resolver.is_mock() {
        return ControlFlow::Continue(state);
    }
    let (result, stripped) = match_security(&pattern.security, &state.request, state.resolver);
    let state = MatchState {
        request: stripped,
        ..state
    };
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("SECURITY")))
}

fn match_query<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    let result = pattern.query.matches(&state.request.query, state.resolver);
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("QUERY").breadcrumb("PARAMETERS")))
}

fn match_headers<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    if let (Some(expected), Some(actual)) = (&pattern.content_type, state.request.content_type()) {
        if media_type(expected) != actual {
            return ControlFlow::Break(
                Failure::new(state.resolver.messages().mismatch(expected, actual))
                    .with_reason(FailureReason::ContentTypeMismatch)
                    .breadcrumb("Content-Type")
                    .breadcrumb("HEADER")
                    .breadcrumb("PARAMETERS"),
            );
        }
    }
    let result = pattern.headers.matches(&state.request.headers, state.resolver);
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("HEADER").breadcrumb("PARAMETERS")))
}

fn match_form_fields<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    let result = pattern.form_fields.matches(&state.request.form_fields, state.resolver);
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("FORM-FIELDS")))
}

fn match_multipart<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    let result = match_parts(&pattern.multipart, &state.request.multipart, state.resolver);
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("MULTIPART-FORMDATA")))
}

fn match_body<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    let result = match &pattern.body {
        Some(body) => state.resolver.at_root().matches(body.as_ref(), &state.request.body),
        None if state.request.body.is_null() => MatchResult::success(),
        None => MatchResult::failure(state.resolver.messages().mismatch("no body", &value_to_text(&state.request.body))),
    };
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("BODY")))
}

fn match_body_regex<'a>(pattern: &HttpRequestPattern, state: MatchState<'a>) -> ControlFlow<Failure, MatchState<'a>> {
    let Some(expression) = &pattern.body_regex else {
        return ControlFlow::Continue(state);
    };
    let text = value_to_text(&state.request.body);
    let result = match regex_lite::Regex::new(&format!("^(?:{expression})$")) {
        Ok(regex) if regex.is_match(&text) => MatchResult::success(),
        Ok(_) => MatchResult::failure(
            state
                .resolver
                .messages()
                .mismatch(&format!("body matching /{expression}/"), &format!("\"{text}\"")),
        ),
        Err(e) => MatchResult::failure(format!("Invalid body regex /{expression}/: {e}")),
    };
    ControlFlow::Continue(state.soft(result, |f| f.breadcrumb("BODY")))
}
