//! Request patterns: every facet of an HTTP request an operation accepts

mod multipart;
mod pipeline;

pub use multipart::MultipartPattern;

use crate::error::EngineError;
use crate::facet::{FacetKind, KeyedPattern, PathPattern, SecurityScheme};
use crate::http::{CONTENT_TYPE, HttpRequest};
use crate::node::combine::zip_padded;
use crate::node::{LazySeq, Node};
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult};
use crate::row::Row;

#[derive(Debug, Clone)]
pub struct HttpRequestPattern {
    pub method: String,
    pub path: PathPattern,
    pub query: KeyedPattern,
    pub headers: KeyedPattern,
    /// `None`: the request carries no body
    pub body: Option<Node>,
    pub form_fields: KeyedPattern,
    pub multipart: Vec<MultipartPattern>,
    /// Alternatives; empty means unauthenticated
    pub security: Vec<SecurityScheme>,
    pub content_type: Option<String>,
    /// Whole-body text constraint
    pub body_regex: Option<String>,
}

impl HttpRequestPattern {
    #[must_use]
    pub fn new(method: &str, path: PathPattern) -> Self {
        Self {
            method: method.to_uppercase(),
            path,
            query: KeyedPattern::empty(FacetKind::Query),
            headers: KeyedPattern::empty(FacetKind::Header),
            body: None,
            form_fields: KeyedPattern::empty(FacetKind::FormField),
            multipart: Vec::new(),
            security: Vec::new(),
            content_type: None,
            body_regex: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: KeyedPattern) -> Self {
        self.query = query;
        self
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
    pub fn with_form_fields(mut self, form_fields: KeyedPattern) -> Self {
        self.form_fields = form_fields;
        self
    }

    #[must_use]
    pub fn with_part(mut self, part: MultipartPattern) -> Self {
        self.multipart.push(part);
        self
    }

    #[must_use]
    pub fn with_security(mut self, security: Vec<SecurityScheme>) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_body_regex(mut self, regex: impl Into<String>) -> Self {
        self.body_regex = Some(regex.into());
        self
    }

    /// `POST /users/{id}`
    #[must_use]
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path.template())
    }

    /// Same method and path template
    #[must_use]
    pub fn same_operation(&self, other: &HttpRequestPattern) -> bool {
        self.method == other.method && self.path.template() == other.path.template()
    }

    /// Run the staged pipeline against `request`.
    ///
    /// Path, method and content type mismatches stop the pipeline; every other
    /// stage's failure is collected. The result is breadcrumbed `REQUEST`.
    #[must_use]
    pub fn matches(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        pipeline::run(self, request, resolver)
    }

    /// A concrete request this pattern accepts.
    ///
    /// # Errors
    ///
    /// Propagates generation errors of any facet.
    pub fn generate(&self, resolver: &Resolver) -> Result<HttpRequest, EngineError> {
        let mut request = HttpRequest::new(&self.method, self.path.generate(resolver)?);
        request.query = self.query.generate(resolver)?;
        request.headers = self.headers.generate(resolver)?;
        request.form_fields = self.form_fields.generate(resolver)?;
        for part in &self.multipart {
            if let Some(part) = part.generate(resolver)? {
                request.multipart.push(part);
            }
        }
        if let Some(body) = &self.body {
            request.body = resolver.at_root().generate(body.as_ref())?;
        }
        if let Some(content_type) = &self.content_type {
            request.headers.insert(CONTENT_TYPE.to_string(), content_type.clone());
        }
        if let Some(scheme) = self.security.first() {
            scheme.add_credentials(&mut request);
        }
        tracing::trace!(%request, "generated request");
        Ok(request)
    }

    /// Positive variants for one example row.
    ///
    /// The body sequence drives the iteration; for each body every facet
    /// combination is produced, facets zipped all-or-nothing. Nothing is
    /// generated ahead of what the consumer pulls.
    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<HttpRequestPattern, EngineError>> {
        let bodies: LazySeq<Result<Option<Node>, EngineError>> = match &self.body {
            Some(body) => Box::new(
                resolver
                    .strategy()
                    .request_bodies(body, row, &resolver.at_root())
                    .map(|variant| variant.map(Some)),
            ),
            None => Box::new(std::iter::once(Ok(None))),
        };

        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        Box::new(bodies.flat_map(move |body| -> LazySeq<Result<HttpRequestPattern, EngineError>> {
            match body {
                Err(e) => Box::new(std::iter::once(Err(e))),
                Ok(body) => Box::new(this.facet_combinations(&row, &resolver).map(move |pattern| {
                    pattern.map(|pattern| HttpRequestPattern {
                        body: body.clone(),
                        ..pattern
                    })
                })),
            }
        }))
    }

    fn facet_combinations(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<HttpRequestPattern, EngineError>> {
        let paths: LazySeq<Result<PathPattern, EngineError>> = match self.path.new_based_on(row, resolver) {
            Ok(paths) => Box::new(paths.into_iter().map(Ok)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        };
        let parts: LazySeq<Result<Vec<MultipartPattern>, EngineError>> =
            multipart::parts_based_on(&self.multipart, row, resolver);
        let keyed = zip_padded(
            self.query.new_based_on(row, resolver),
            zip_padded(
                self.headers.new_based_on(row, resolver),
                zip_padded(self.form_fields.new_based_on(row, resolver), parts),
            ),
        );
        let this = self.clone();
        Box::new(zip_padded(paths, keyed).map(move |combination| {
            combination.map(|(path, (query, (headers, (form_fields, multipart))))| HttpRequestPattern {
                path,
                query,
                headers,
                form_fields,
                multipart,
                ..this.clone()
            })
        }))
    }

    /// Variants each of which breaks exactly one facet: body first, then
    /// path parameters, query, headers, form fields and multipart parts.
    #[must_use]
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<HttpRequestPattern, EngineError>> {
        if !resolver.is_generative() {
            return Box::new(std::iter::empty());
        }

        let with_body = {
            let this = self.clone();
            move |body: Node| HttpRequestPattern {
                body: Some(body),
                ..this.clone()
            }
        };
        let bodies: LazySeq<Result<HttpRequestPattern, EngineError>> = match &self.body {
            Some(body) => Box::new(
                resolver
                    .strategy()
                    .negative_variants(body, &row.for_body(), &resolver.at_root())
                    .map(move |variant| variant.map(&with_body)),
            ),
            None => Box::new(std::iter::empty()),
        };

        let this = self.clone();
        let paths = self.path.negative_based_on(row, resolver).map(move |p| {
            p.map(|path| HttpRequestPattern {
                path,
                ..this.clone()
            })
        });
        let this = self.clone();
        let queries = self.query.negative_based_on(row, resolver).map(move |q| {
            q.map(|query| HttpRequestPattern {
                query,
                ..this.clone()
            })
        });
        let this = self.clone();
        let headers = self.headers.negative_based_on(row, resolver).map(move |h| {
            h.map(|headers| HttpRequestPattern {
                headers,
                ..this.clone()
            })
        });
        let this = self.clone();
        let forms = self.form_fields.negative_based_on(row, resolver).map(move |f| {
            f.map(|form_fields| HttpRequestPattern {
                form_fields,
                ..this.clone()
            })
        });

        let this = self.clone();
        let parts = multipart::parts_negative_based_on(&self.multipart, row, resolver).map(move |m| {
            m.map(|multipart| HttpRequestPattern {
                multipart,
                ..this.clone()
            })
        });

        Box::new(bodies.chain(paths).chain(queries).chain(headers).chain(forms).chain(parts))
    }

    /// Every request `other` accepts is accepted here
    #[must_use]
    pub fn subsumes(&self, other: &HttpRequestPattern, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if self.method != other.method {
            return MatchResult::Failure(
                Failure::new(mine.messages().mismatch(&self.method, &other.method))
                    .with_reason(FailureReason::MethodMismatch)
                    .breadcrumb("METHOD")
                    .breadcrumb("REQUEST"),
            );
        }
        if let MatchResult::Failure(f) = self.path.subsumes(&other.path, mine, theirs) {
            return MatchResult::Failure(f.breadcrumb("PATH").breadcrumb("REQUEST"));
        }

        let mut failures = Vec::new();
        for (mine_facet, their_facet) in [
            (&self.query, &other.query),
            (&self.headers, &other.headers),
            (&self.form_fields, &other.form_fields),
        ] {
            if let MatchResult::Failure(f) = mine_facet.subsumes(their_facet, mine, theirs) {
                failures.push(f.breadcrumb(mine_facet.kind().label()).breadcrumb("PARAMETERS"));
            }
        }
        if let MatchResult::Failure(f) = multipart::subsumes_parts(&self.multipart, &other.multipart, mine, theirs) {
            failures.push(f.breadcrumb("MULTIPART-FORMDATA"));
        }
        match (&self.body, &other.body) {
            (Some(a), Some(b)) => {
                if let MatchResult::Failure(f) = a.subsumes(b.as_ref(), &mine.at_root(), &theirs.at_root()) {
                    failures.push(f.breadcrumb("BODY"));
                }
            }
            (None, Some(b)) => {
                failures.push(Failure::new(mine.messages().mismatch("no body", &b.type_name())).breadcrumb("BODY"));
            }
            (_, None) => {}
        }
        Failure::result_of(failures).breadcrumb("REQUEST")
    }
}
