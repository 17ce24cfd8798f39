//! Security schemes: which credentials a request must carry

use rand::Rng;

use crate::http::HttpRequest;
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};

const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// One way a request may authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    Bearer,
    Basic,
    ApiKey { location: ApiKeyLocation, name: String },
    /// Every listed scheme at once
    All(Vec<SecurityScheme>),
}

/// How much of a scheme's credentials a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Presence {
    Full,
    Partial,
    Absent,
}

impl SecurityScheme {
    #[must_use]
    pub fn presence(&self, request: &HttpRequest) -> Presence {
        match self {
            Self::Bearer => authorization_presence(request, "Bearer"),
            Self::Basic => authorization_presence(request, "Basic"),
            Self::ApiKey { location, name } => match api_key(request, *location, name) {
                None => Presence::Absent,
                Some(value) if value.trim().is_empty() => Presence::Partial,
                Some(_) => Presence::Full,
            },
            Self::All(schemes) => {
                let presences: Vec<Presence> = schemes.iter().map(|s| s.presence(request)).collect();
                if presences.iter().all(|p| *p == Presence::Full) {
                    Presence::Full
                } else if presences.iter().all(|p| *p == Presence::Absent) {
                    Presence::Absent
                } else {
                    Presence::Partial
                }
            }
        }
    }

    /// What is wrong with this scheme's credentials in `request`
    fn diagnose(&self, request: &HttpRequest) -> Vec<Failure> {
        match self {
            Self::Bearer | Self::Basic => {
                let scheme = if *self == Self::Bearer { "Bearer" } else { "Basic" };
                let message = match request.header(AUTHORIZATION) {
                    None => format!("Expected header named \"{AUTHORIZATION}\" was missing"),
                    Some(_) => format!("{AUTHORIZATION} header must use the {scheme} scheme with a credential"),
                };
                vec![Failure::new(message).breadcrumb(AUTHORIZATION)]
            }
            Self::ApiKey { location, name } => {
                let kind = match location {
                    ApiKeyLocation::Header => "header",
                    ApiKeyLocation::Query => "query param",
                };
                let message = match api_key(request, *location, name) {
                    None => format!("Expected {kind} named \"{name}\" was missing"),
                    Some(_) => format!("API key {kind} \"{name}\" is empty"),
                };
                vec![Failure::new(message).breadcrumb(name.as_str())]
            }
            Self::All(schemes) => schemes
                .iter()
                .filter(|s| s.presence(request) != Presence::Full)
                .flat_map(|s| s.diagnose(request))
                .collect(),
        }
    }

    /// Remove this scheme's credentials so later stages do not see them
    fn strip(&self, request: &mut HttpRequest) {
        match self {
            Self::Bearer | Self::Basic => {
                request.headers.retain(|k, _| !k.eq_ignore_ascii_case(AUTHORIZATION));
            }
            Self::ApiKey { location: ApiKeyLocation::Header, name } => {
                request.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
            }
            Self::ApiKey { location: ApiKeyLocation::Query, name } => {
                request.query.remove(name);
            }
            Self::All(schemes) => schemes.iter().for_each(|s| s.strip(request)),
        }
    }

    /// Add credentials for this scheme to a generated request
    pub fn add_credentials(&self, request: &mut HttpRequest) {
        match self {
            Self::Bearer => {
                request.headers.insert(AUTHORIZATION.to_string(), format!("Bearer {}", random_token()));
            }
            Self::Basic => {
                // user:password
                request.headers.insert(AUTHORIZATION.to_string(), "Basic dXNlcjpwYXNzd29yZA==".to_string());
            }
            Self::ApiKey { location, name } => {
                let target = match location {
                    ApiKeyLocation::Header => &mut request.headers,
                    ApiKeyLocation::Query => &mut request.query,
                };
                target.insert(name.clone(), random_token());
            }
            Self::All(schemes) => schemes.iter().for_each(|s| s.add_credentials(request)),
        }
    }
}

fn authorization_presence(request: &HttpRequest, scheme: &str) -> Presence {
    let Some(value) = request.header(AUTHORIZATION) else {
        return Presence::Absent;
    };
    let mut parts = value.splitn(2, ' ');
    let prefix = parts.next().unwrap_or_default();
    let credential = parts.next().unwrap_or_default().trim();
    if prefix.eq_ignore_ascii_case(scheme) && !credential.is_empty() {
        Presence::Full
    } else {
        Presence::Partial
    }
}

fn api_key<'a>(request: &'a HttpRequest, location: ApiKeyLocation, name: &str) -> Option<&'a str> {
    match location {
        ApiKeyLocation::Header => request.header(name),
        ApiKeyLocation::Query => request.query.get(name).map(String::as_str),
    }
}

fn first_with<'a>(schemes: &'a [SecurityScheme], request: &HttpRequest, presence: Presence) -> Option<&'a SecurityScheme> {
    schemes.iter().find(|s| s.presence(request) == presence)
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..24)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

/// Check `request` against alternative `schemes`.
///
/// The first non-empty bucket decides, in the order fully supplied, partially
/// supplied, absent. On success the returned request no longer carries the
/// matched credentials.
#[must_use]
pub fn match_security(schemes: &[SecurityScheme], request: &HttpRequest, resolver: &Resolver) -> (MatchResult, HttpRequest) {
    let mut stripped = request.clone();
    if schemes.is_empty() {
        return (MatchResult::success(), stripped);
    }

    if let Some(scheme) = first_with(schemes, request, Presence::Full) {
        scheme.strip(&mut stripped);
        return (MatchResult::success(), stripped);
    }
    if let Some(scheme) = first_with(schemes, request, Presence::Partial) {
        let result = Failure::result_of(scheme.diagnose(request));
        return (result, stripped);
    }
    let failures: Vec<Failure> = schemes.iter().flat_map(|s| s.diagnose(request)).collect();
    let failure = Failure::new(resolver.messages().mismatch(
        "credentials for one of the declared security schemes",
        "none",
    ));
    let failure = failures.into_iter().fold(failure, Failure::with_cause);
    (MatchResult::Failure(failure), stripped)
}
