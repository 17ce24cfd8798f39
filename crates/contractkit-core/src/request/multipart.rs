use crate::error::{CycleExt, EngineError};
use crate::facet::{distinct_by_subsumption, pinned};
use crate::http::{MultipartPart, media_type};
use crate::key_check::KeyError;
use crate::node::combine::all_or_nothing;
use crate::node::{LazySeq, Node, value_to_text};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

/// One declared part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartPattern {
    pub name: String,
    pub content: Node,
    pub optional: bool,
    pub content_type: Option<String>,
}

impl MultipartPattern {
    #[must_use]
    pub fn new(name: impl Into<String>, content: Node) -> Self {
        Self {
            name: name.into(),
            content,
            optional: false,
            content_type: None,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn matches_part(&self, part: &MultipartPart, resolver: &Resolver) -> MatchResult {
        let mut failures = Vec::new();
        if let (Some(expected), Some(actual)) = (&self.content_type, &part.content_type) {
            if media_type(expected) != media_type(actual) {
                failures.push(Failure::new(resolver.messages().mismatch(expected, actual)).breadcrumb("CONTENT-TYPE"));
            }
        }
        if let MatchResult::Failure(f) = resolver.matches_text(self.content.as_ref(), &part.content) {
            failures.push(f);
        }
        Failure::result_of(failures).breadcrumb(self.name.as_str())
    }

    /// `None` for an optional part whose content cycles
    pub(crate) fn generate(&self, resolver: &Resolver) -> Result<Option<MultipartPart>, EngineError> {
        let generated = resolver.with_lookup_key(&self.name).generate(self.content.as_ref());
        let content = if self.optional {
            generated.cycle_as_none()?
        } else {
            Some(generated?)
        };
        Ok(content.map(|content| MultipartPart {
            name: self.name.clone(),
            content: value_to_text(&content),
            filename: None,
            content_type: self.content_type.clone(),
        }))
    }
}

/// Part lists for one example row: every optional-part subset the strategy
/// asks for, each part's content expanded through the strategy. Parts named
/// by the row are always present, pinned to the row's value. Lists covered
/// by an earlier one are dropped.
pub(crate) fn parts_based_on(
    patterns: &[MultipartPattern],
    row: &Row,
    resolver: &Resolver,
) -> LazySeq<Result<Vec<MultipartPattern>, EngineError>> {
    let mut mandatory = Vec::new();
    let mut optional = Vec::new();
    for pattern in patterns {
        if pattern.optional && row.column(&pattern.name).is_none() {
            optional.push(pattern.name.clone());
        } else {
            mandatory.push(pattern.name.clone());
        }
    }

    let patterns = patterns.to_vec();
    let row = row.clone();
    let inner = resolver.clone();
    let candidates = resolver
        .strategy()
        .key_combinations(mandatory, optional)
        .flat_map(move |names| match variants_for_parts(&patterns, &names, &row, &inner) {
            Ok(variants) => variants.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        });
    distinct_by_subsumption(Box::new(candidates), resolver, |a, b, mine, theirs| {
        subsumes_parts(a, b, mine, theirs)
    })
}

fn variants_for_parts(
    patterns: &[MultipartPattern],
    names: &[String],
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<Vec<MultipartPattern>>, EngineError> {
    let mut positions: Vec<Vec<MultipartPattern>> = Vec::with_capacity(names.len());
    for pattern in patterns.iter().filter(|p| names.contains(&p.name)) {
        let at_part = resolver.with_lookup_key(&pattern.name);
        let contents: Vec<Node> = match row.column(&pattern.name) {
            Some(text) => vec![pinned(&pattern.content, text, &at_part)?],
            None => {
                let mut contents = Vec::new();
                for variant in resolver
                    .strategy()
                    .positive_variants(&pattern.content, &Row::empty(), &at_part)
                {
                    if let Some(node) = variant.cycle_as_none()? {
                        contents.push(node);
                    }
                }
                contents
            }
        };
        positions.push(
            contents
                .into_iter()
                .map(|content| MultipartPattern {
                    content,
                    optional: false,
                    ..pattern.clone()
                })
                .collect(),
        );
    }
    Ok(all_or_nothing(&positions))
}

/// Every part list `theirs` may send is accepted by `ours`
pub(crate) fn subsumes_parts(ours: &[MultipartPattern], theirs: &[MultipartPattern], mine: &Resolver, their_resolver: &Resolver) -> MatchResult {
    let mut failures = Vec::new();
    for part in ours {
        match theirs.iter().find(|p| p.name == part.name) {
            None if !part.optional => {
                failures.push(KeyError::MissingKey(part.name.clone()).to_failure("part", mine.messages()));
            }
            None => {}
            Some(their) => {
                if !part.optional && their.optional {
                    failures.push(KeyError::MissingKey(part.name.clone()).to_failure("part", mine.messages()));
                }
                if let MatchResult::Failure(f) = part.content.subsumes(their.content.as_ref(), mine, their_resolver) {
                    failures.push(f.breadcrumb(part.name.as_str()));
                }
            }
        }
    }
    for their in theirs {
        if !ours.iter().any(|p| p.name == their.name) {
            failures.push(KeyError::UnexpectedKey(their.name.clone()).to_failure("part", mine.messages()));
        }
    }
    Failure::result_of(failures)
}

/// Part lists each breaking one part: its content replaced by an invalid
/// one, or, for a mandatory part, the part left out. Nothing in
/// non-generative mode.
pub(crate) fn parts_negative_based_on(
    patterns: &[MultipartPattern],
    row: &Row,
    resolver: &Resolver,
) -> LazySeq<Result<Vec<MultipartPattern>, EngineError>> {
    if !resolver.is_generative() {
        return Box::new(std::iter::empty());
    }
    let patterns = patterns.to_vec();
    let row = row.clone();
    let resolver = resolver.clone();
    Box::new((0..patterns.len()).flat_map(move |index| {
        let target = patterns[index].clone();
        let replaced = |content: Node| -> Vec<MultipartPattern> {
            let mut parts = patterns.clone();
            parts[index] = MultipartPattern {
                content,
                optional: false,
                ..target.clone()
            };
            parts
        };
        let mut out: Vec<Result<Vec<MultipartPattern>, EngineError>> = resolver
            .strategy()
            .negative_text_variants(&target.content, &row, &resolver.with_lookup_key(&target.name))
            .map(|negative| negative.map(&replaced))
            .collect();
        if !target.optional {
            let mut without = patterns.clone();
            without.remove(index);
            out.push(Ok(without));
        }
        out
    }))
}

/// Declared parts against actual parts. Undeclared parts follow the key policy.
pub(crate) fn match_parts(patterns: &[MultipartPattern], parts: &[MultipartPart], resolver: &Resolver) -> MatchResult {
    let declared = patterns.iter().map(|p| (p.name.as_str(), p.optional));
    let actual: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
    let mut failures: Vec<Failure> = resolver
        .key_policy()
        .check(declared, &actual, false, crate::key_check::exact_key)
        .iter()
        .map(|e| e.to_failure("part", resolver.messages()))
        .collect();

    for pattern in patterns {
        if let Some(part) = parts.iter().find(|p| p.name == pattern.name) {
            if let MatchResult::Failure(f) = pattern.matches_part(part, resolver) {
                failures.push(f);
            }
        }
    }
    Failure::result_of(failures)
}
