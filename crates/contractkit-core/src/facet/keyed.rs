use std::collections::BTreeMap;

use super::distinct_by_subsumption;
use super::path::pinned;
use crate::error::{CycleExt, EngineError};
use crate::key_check::{KeyError, exact_key, header_key};
use crate::node::combine::all_or_nothing;
use crate::node::{LazySeq, Node, value_to_text};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

/// Headers every client or proxy adds; never reported as unexpected.
const TRANSPORT_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "accept-language",
    "authorization",
    "cache-control",
    "connection",
    "content-length",
    "content-type",
    "cookie",
    "date",
    "host",
    "keep-alive",
    "origin",
    "pragma",
    "referer",
    "server",
    "transfer-encoding",
    "user-agent",
    "vary",
];

/// Which keyed part of a message a [`KeyedPattern`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Query,
    Header,
    FormField,
}

impl FacetKind {
    /// Word used in key diagnostics
    #[must_use]
    pub const fn key_kind(self) -> &'static str {
        match self {
            Self::Query => "query param",
            Self::Header => "header",
            Self::FormField => "form field",
        }
    }

    /// Breadcrumb of the facet inside a message
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Header => "HEADER",
            Self::FormField => "FORM-FIELDS",
        }
    }

    fn same_key(self, a: &str, b: &str) -> bool {
        match self {
            Self::Header => header_key(a, b),
            Self::Query | Self::FormField => exact_key(a, b),
        }
    }
}

/// One declared key of a keyed facet.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub node: Node,
    pub optional: bool,
}

impl ParamSpec {
    #[must_use]
    pub fn mandatory(node: Node) -> Self {
        Self { node, optional: false }
    }

    #[must_use]
    pub fn optional(node: Node) -> Self {
        Self { node, optional: true }
    }
}

/// Query parameters, headers or form fields: named text values.
#[derive(Debug, Clone)]
pub struct KeyedPattern {
    kind: FacetKind,
    params: BTreeMap<String, ParamSpec>,
    /// Schema for undeclared keys; `None` leaves them to the key policy
    additional: Option<Node>,
}

impl KeyedPattern {
    #[must_use]
    pub fn new(kind: FacetKind, params: BTreeMap<String, ParamSpec>) -> Self {
        Self {
            kind,
            params,
            additional: None,
        }
    }

    #[must_use]
    pub fn empty(kind: FacetKind) -> Self {
        Self::new(kind, BTreeMap::new())
    }

    #[must_use]
    pub fn with_additional(mut self, node: Node) -> Self {
        self.additional = Some(node);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> FacetKind {
        self.kind
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, ParamSpec> {
        &self.params
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn declared(&self, name: &str) -> Option<(&String, &ParamSpec)> {
        self.params.iter().find(|(key, _)| self.kind.same_key(key, name))
    }

    fn is_transport_header(&self, name: &str) -> bool {
        self.kind == FacetKind::Header && TRANSPORT_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Key policy first, then every present key's value as text.
    ///
    /// Failures carry the key as breadcrumb; the caller adds the facet label.
    #[must_use]
    pub fn matches(&self, actual: &BTreeMap<String, String>, resolver: &Resolver) -> MatchResult {
        let present: Vec<&str> = actual
            .keys()
            .map(String::as_str)
            .filter(|name| self.declared(name).is_some() || !self.is_transport_header(name))
            .collect();

        let mut failures: Vec<Failure> = resolver
            .key_policy()
            .check(
                self.params.iter().map(|(k, p)| (k.as_str(), p.optional)),
                &present,
                self.additional.is_some(),
                |a, b| self.kind.same_key(a, b),
            )
            .iter()
            .map(|e| e.to_failure(self.kind.key_kind(), resolver.messages()))
            .collect();

        for name in present {
            let text = actual.get(name).map_or("", String::as_str);
            let node = match (self.declared(name), &self.additional) {
                (Some((_, spec)), _) => &spec.node,
                (None, Some(additional)) => additional,
                (None, None) => continue,
            };
            if let MatchResult::Failure(f) = resolver.with_lookup_key(name).matches_text(node.as_ref(), text) {
                failures.push(f.breadcrumb(name));
            }
        }

        Failure::result_of(failures)
    }

    /// Values for every declared key. An optional key that cycles is left out.
    ///
    /// # Errors
    ///
    /// Propagates generation errors of mandatory keys.
    pub fn generate(&self, resolver: &Resolver) -> Result<BTreeMap<String, String>, EngineError> {
        let mut out = BTreeMap::new();
        for (name, spec) in &self.params {
            let generated = resolver.with_lookup_key(name).generate(spec.node.as_ref());
            let value = if spec.optional {
                generated.cycle_as_none()?
            } else {
                Some(generated?)
            };
            if let Some(value) = value {
                out.insert(name.clone(), value_to_text(&value));
            }
        }
        Ok(out)
    }

    /// Facet variants for one example row.
    ///
    /// Key sets come from the strategy, with keys named by the row always
    /// included. Columns pin values; other keys expand through the strategy.
    /// Variants covered by an earlier one are dropped.
    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<KeyedPattern, EngineError>> {
        let (mandatory, optional): (Vec<String>, Vec<String>) = {
            let mut mandatory = Vec::new();
            let mut optional = Vec::new();
            for (name, spec) in &self.params {
                if spec.optional && row.column(name).is_none() {
                    optional.push(name.clone());
                } else {
                    mandatory.push(name.clone());
                }
            }
            (mandatory, optional)
        };

        let this = self.clone();
        let row = row.clone();
        let inner = resolver.clone();
        let candidates = resolver
            .strategy()
            .key_combinations(mandatory, optional)
            .flat_map(move |keys| match this.variants_for_keys(&keys, &row, &inner) {
                Ok(variants) => variants.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            });
        distinct_by_subsumption(Box::new(candidates), resolver, |a, b, mine, theirs| {
            a.subsumes(b, mine, theirs)
        })
    }

    fn variants_for_keys(&self, keys: &[String], row: &Row, resolver: &Resolver) -> Result<Vec<KeyedPattern>, EngineError> {
        let mut positions: Vec<Vec<(String, ParamSpec)>> = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(spec) = self.params.get(key) else {
                continue;
            };
            let at_key = resolver.with_lookup_key(key);
            let nodes: Vec<Node> = match row.column(key) {
                Some(text) => vec![pinned(&spec.node, text, &at_key)?],
                None => {
                    let mut nodes = Vec::new();
                    for variant in resolver.strategy().positive_variants(&spec.node, &Row::empty(), &at_key) {
                        if let Some(node) = variant.cycle_as_none()? {
                            nodes.push(node);
                        }
                    }
                    nodes
                }
            };
            positions.push(
                nodes
                    .into_iter()
                    .map(|node| (key.clone(), ParamSpec::mandatory(node)))
                    .collect(),
            );
        }
        Ok(all_or_nothing(&positions)
            .into_iter()
            .map(|params| KeyedPattern {
                kind: self.kind,
                params: params.into_iter().collect(),
                additional: self.additional.clone(),
            })
            .collect())
    }

    /// Variants with one key's value replaced by an invalid one, and variants
    /// with one mandatory key removed. Nothing in non-generative mode.
    #[must_use]
    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> LazySeq<Result<KeyedPattern, EngineError>> {
        if !resolver.is_generative() {
            return Box::new(std::iter::empty());
        }
        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let names: Vec<String> = self.params.keys().cloned().collect();
        Box::new(names.into_iter().flat_map(move |name| {
            let Some(spec) = this.params.get(&name).cloned() else {
                return Vec::new();
            };
            let mut out: Vec<Result<KeyedPattern, EngineError>> = resolver
                .strategy()
                .negative_text_variants(&spec.node, &row, &resolver.with_lookup_key(&name))
                .map(|negative| negative.map(|node| this.replaced(&name, ParamSpec::mandatory(node))))
                .collect();
            if !spec.optional {
                let mut without = this.clone();
                without.params.remove(&name);
                out.push(Ok(without));
            }
            out
        }))
    }

    fn replaced(&self, name: &str, spec: ParamSpec) -> KeyedPattern {
        let mut params = self.params.clone();
        params.insert(name.to_string(), spec);
        KeyedPattern {
            kind: self.kind,
            params,
            additional: self.additional.clone(),
        }
    }

    /// Every key set and value `other` accepts is accepted here
    #[must_use]
    pub fn subsumes(&self, other: &KeyedPattern, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        let kind = self.kind.key_kind();
        let mut failures = Vec::new();

        for (name, spec) in &self.params {
            match other.declared(name) {
                None if !spec.optional => {
                    failures.push(KeyError::MissingKey(name.clone()).to_failure(kind, mine.messages()));
                }
                None => {}
                Some((_, their)) => {
                    if !spec.optional && their.optional {
                        failures.push(KeyError::MissingKey(name.clone()).to_failure(kind, mine.messages()));
                        continue;
                    }
                    if let MatchResult::Failure(f) = spec.node.subsumes(their.node.as_ref(), mine, theirs) {
                        failures.push(f.breadcrumb(name.as_str()));
                    }
                }
            }
        }

        for (name, their) in &other.params {
            if self.declared(name).is_some() || self.is_transport_header(name) {
                continue;
            }
            match &self.additional {
                Some(additional) => {
                    if let MatchResult::Failure(f) = additional.subsumes(their.node.as_ref(), mine, theirs) {
                        failures.push(f.breadcrumb(name.as_str()));
                    }
                }
                None => {
                    let errors = mine.key_policy().check(std::iter::empty(), &[name.as_str()], false, exact_key);
                    failures.extend(errors.iter().map(|e| e.to_failure(kind, mine.messages())));
                }
            }
        }

        Failure::result_of(failures)
    }
}

impl Default for KeyedPattern {
    fn default() -> Self {
        Self::empty(FacetKind::Query)
    }
}

/// Keyed facet with one mandatory key per entry
#[must_use]
pub fn keyed_of(kind: FacetKind, params: impl IntoIterator<Item = (String, Node)>) -> KeyedPattern {
    KeyedPattern::new(
        kind,
        params
            .into_iter()
            .map(|(name, node)| (name, ParamSpec::mandatory(node)))
            .collect(),
    )
}
