use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ContractError, EngineError};
use crate::node::combine::all_or_nothing;
use crate::node::{LazySeq, Node, StringNode, exact, value_to_text};
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult};
use crate::row::Row;

#[derive(Debug, Clone)]
pub enum PathSegment {
    Literal(String),
    Param { name: String, node: Node },
}

/// URL path template such as `/users/{id}/orders`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<PathSegment>,
}

/// Non-empty segments of a concrete path
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl PathPattern {
    /// Build from an OpenAPI-style template. Parameters without a declared
    /// node are strings.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidPathTemplate`] when the template is not absolute.
    pub fn from_template(template: &str, params: &BTreeMap<String, Node>) -> Result<Self, ContractError> {
        if !template.starts_with('/') {
            return Err(ContractError::InvalidPathTemplate(template.to_string()));
        }
        let segments = split_path(template)
            .into_iter()
            .map(|segment| {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => PathSegment::Param {
                        name: name.to_string(),
                        node: params
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| Arc::new(StringNode::default())),
                    },
                    None => PathSegment::Literal(segment.to_string()),
                }
            })
            .collect();
        Ok(Self { segments })
    }

    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// OpenAPI form: `/users/{id}`
    #[must_use]
    pub fn template(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => text.clone(),
                PathSegment::Param { name, .. } => format!("{{{name}}}"),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Param { name, .. } => Some(name.as_str()),
            PathSegment::Literal(_) => None,
        })
    }

    /// Segment count first, then literals, then parameters.
    #[must_use]
    pub fn matches(&self, path: &str, resolver: &Resolver) -> MatchResult {
        let actual = split_path(path);
        if actual.len() != self.segments.len() {
            return MatchResult::Failure(
                Failure::new(resolver.messages().mismatch(
                    &format!("{self} (having {} path segments)", self.segments.len()),
                    &format!("{path} (having {} path segments)", actual.len()),
                ))
                .with_reason(FailureReason::UrlPathMismatch),
            );
        }

        let mut literal_failures = Vec::new();
        let mut param_failures = Vec::new();
        for (index, (segment, text)) in self.segments.iter().zip(&actual).enumerate() {
            match segment {
                PathSegment::Literal(expected) if expected != text => literal_failures.push(
                    Failure::new(resolver.messages().mismatch(expected, &format!("\"{text}\"")))
                        .breadcrumb(format!("[{index}]")),
                ),
                PathSegment::Literal(_) => {}
                PathSegment::Param { name, node } => {
                    if let MatchResult::Failure(f) = resolver.matches_text(node.as_ref(), text) {
                        param_failures.push(f.breadcrumb(name.as_str()));
                    }
                }
            }
        }

        if !literal_failures.is_empty() {
            literal_failures.extend(param_failures);
            return Failure::merge(literal_failures).map_or_else(MatchResult::success, |f| {
                MatchResult::Failure(f.with_reason(FailureReason::UrlPathMismatch))
            });
        }
        Failure::merge(param_failures).map_or_else(MatchResult::success, |f| {
            MatchResult::Failure(f.with_reason(FailureReason::UrlPathParamMismatchButSameStructure))
        })
    }

    /// Values bound to each parameter of a matching path
    #[must_use]
    pub fn bindings(&self, path: &str) -> BTreeMap<String, String> {
        self.segments
            .iter()
            .zip(split_path(path))
            .filter_map(|(segment, text)| match segment {
                PathSegment::Param { name, .. } => Some((name.clone(), text.to_string())),
                PathSegment::Literal(_) => None,
            })
            .collect()
    }

    /// # Errors
    ///
    /// Propagates generation errors of parameter nodes.
    pub fn generate(&self, resolver: &Resolver) -> Result<String, EngineError> {
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(text) => parts.push(text.clone()),
                PathSegment::Param { name, node } => {
                    let value = resolver.with_lookup_key(name).generate(node.as_ref())?;
                    parts.push(value_to_text(&value));
                }
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }

    /// Path variants: example columns pin parameters, the strategy expands the rest.
    ///
    /// # Errors
    ///
    /// An example that its parameter rejects, or a generation error.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<PathPattern>, EngineError> {
        let mut positions: Vec<Vec<PathSegment>> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let PathSegment::Param { name, node } = segment else {
                positions.push(vec![segment.clone()]);
                continue;
            };
            let nodes: Vec<Node> = match row.column(name) {
                Some(text) => vec![pinned(node, text, resolver)?],
                None => resolver
                    .strategy()
                    .positive_variants(node, &Row::empty(), &resolver.with_lookup_key(name))
                    .collect::<Result<_, _>>()?,
            };
            positions.push(
                nodes
                    .into_iter()
                    .map(|node| PathSegment::Param {
                        name: name.clone(),
                        node,
                    })
                    .collect(),
            );
        }
        Ok(all_or_nothing(&positions)
            .into_iter()
            .map(PathPattern::from_segments)
            .collect())
    }

    /// One pattern per invalid parameter value
    #[must_use]
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<PathPattern, EngineError>> {
        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let indices = (0..self.segments.len()).filter(|i| matches!(self.segments[*i], PathSegment::Param { .. }));
        let indices: Vec<usize> = indices.collect();
        Box::new(indices.into_iter().flat_map(move |index| {
            let PathSegment::Param { name, node } = this.segments[index].clone() else {
                return Vec::new();
            };
            let this = this.clone();
            resolver
                .strategy()
                .negative_text_variants(&node, &row, &resolver.with_lookup_key(&name))
                .map(|negative| {
                    negative.map(|node| {
                        let mut segments = this.segments.clone();
                        segments[index] = PathSegment::Param {
                            name: name.clone(),
                            node,
                        };
                        PathPattern::from_segments(segments)
                    })
                })
                .collect::<Vec<_>>()
        }))
    }

    /// Every path `other` accepts is accepted here
    #[must_use]
    pub fn subsumes(&self, other: &PathPattern, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if self.segments.len() != other.segments.len() {
            return MatchResult::Failure(
                Failure::new(mine.messages().mismatch(&self.to_string(), &other.to_string()))
                    .with_reason(FailureReason::UrlPathMismatch),
            );
        }
        let mut structural = Vec::new();
        let mut params = Vec::new();
        for (index, (a, b)) in self.segments.iter().zip(&other.segments).enumerate() {
            match (a, b) {
                (PathSegment::Literal(x), PathSegment::Literal(y)) if x == y => {}
                (PathSegment::Literal(x), other_segment) => structural.push(
                    Failure::new(mine.messages().mismatch(x, &segment_text(other_segment)))
                        .breadcrumb(format!("[{index}]")),
                ),
                (PathSegment::Param { name, node }, PathSegment::Literal(y)) => {
                    if let MatchResult::Failure(f) = mine.matches_text(node.as_ref(), y) {
                        params.push(f.breadcrumb(name.as_str()));
                    }
                }
                (PathSegment::Param { name, node }, PathSegment::Param { node: their, .. }) => {
                    if let MatchResult::Failure(f) = node.subsumes(their.as_ref(), mine, theirs) {
                        params.push(f.breadcrumb(name.as_str()));
                    }
                }
            }
        }
        if !structural.is_empty() {
            structural.extend(params);
            return Failure::merge(structural).map_or_else(MatchResult::success, |f| {
                MatchResult::Failure(f.with_reason(FailureReason::UrlPathMismatch))
            });
        }
        Failure::merge(params).map_or_else(MatchResult::success, |f| {
            MatchResult::Failure(f.with_reason(FailureReason::UrlPathParamMismatchButSameStructure))
        })
    }
}

fn segment_text(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Literal(text) => text.clone(),
        PathSegment::Param { name, node } => format!("({name}:{})", node.type_name()),
    }
}

/// Example text for `node`, as an exact node
pub(crate) fn pinned(node: &Node, text: &str, resolver: &Resolver) -> Result<Node, EngineError> {
    let value = node.parse(text, resolver)?;
    match resolver.matches(node.as_ref(), &value) {
        MatchResult::Success(_) => Ok(exact(value)),
        MatchResult::Failure(f) => Err(ContractError::InvalidExample {
            example: text.to_string(),
            expected: node.type_name(),
            reason: f.report().to_string().trim().to_string(),
        }
        .into()),
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(segment_text).collect();
        write!(f, "/{}", parts.join("/"))
    }
}
