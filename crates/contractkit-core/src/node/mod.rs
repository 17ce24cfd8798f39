//! Schema nodes
//!
//! A schema node is one typed position of a contract schema. The engine only
//! talks to nodes through [`SchemaNode`]; the catalog in this module is the
//! reference set the OpenAPI loader and the stub parser produce.

mod any_of;
pub mod combine;
mod exact;
mod object;
mod reference;
mod scalar;
mod sequence;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ContractError, EngineError};
use crate::mismatch::describe_value;
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

pub use any_of::AnyOfNode;
pub use exact::ExactValue;
pub use object::{Field, ObjectNode};
pub use reference::{FactLookupNode, ReferenceNode};
pub use scalar::{AnyValueNode, BooleanNode, EnumNode, NullNode, NumberNode, StringNode};
pub use sequence::{ListNode, TupleNode};

/// Shared handle to a schema node
pub type Node = Arc<dyn SchemaNode>;

/// Single-pass lazy sequence. Not restartable: consume it once.
pub type LazySeq<T> = Box<dyn Iterator<Item = T>>;

/// Lazy sequence of generated schema nodes
pub type NodeSeq = LazySeq<Result<Node, EngineError>>;

/// Knobs for negative variant generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeConfig {
    /// Also offer values of the wrong JSON type (string for number, ...)
    pub data_type_negatives: bool,
}

impl Default for NegativeConfig {
    fn default() -> Self {
        Self {
            data_type_negatives: true,
        }
    }
}

/// The capability every schema node provides.
pub trait SchemaNode: fmt::Debug + Send + Sync + Any {
    /// Check `value` against this node. Nested checks must go through
    /// [`Resolver::matches`] so pattern tokens are honored in mock mode.
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult;

    /// Produce one conforming value.
    ///
    /// # Errors
    ///
    /// [`EngineError::Cycle`] when a self-reference was cut off.
    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError>;

    /// Positive variants, anchored on the example at the row cursor if any.
    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq;

    /// Candidates that should be rejected by this node.
    fn negative_variants(&self, row: &Row, resolver: &Resolver, config: &NegativeConfig) -> NodeSeq;

    /// Whether every value accepted by `other` (under `theirs`) is accepted
    /// by this node (under `mine`).
    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult;

    /// Read literal text (a path segment, a header value) as a value of this type.
    ///
    /// # Errors
    ///
    /// [`ContractError::Parse`] when the text is not of this type.
    fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError>;

    /// Human-readable type, used in messages and dictionary type defaults
    fn type_name(&self) -> String;

    /// Identity for cycle detection; only named types have one
    fn type_alias(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Node accepting exactly `value`
#[must_use]
pub fn exact(value: Value) -> Node {
    Arc::new(ExactValue::new(value))
}

/// One-element sequence
pub fn once(node: Node) -> NodeSeq {
    Box::new(std::iter::once(Ok(node)))
}

pub fn empty_seq() -> NodeSeq {
    Box::new(std::iter::empty())
}

/// `Expected {expected}, actual was {actual}` in the resolver's wording
#[must_use]
pub fn mismatch(expected: &str, actual: &Value, resolver: &Resolver) -> MatchResult {
    MatchResult::Failure(Failure::new(
        resolver.messages().mismatch(expected, &describe_value(actual)),
    ))
}

/// Subsumption cases that depend only on the shape of `other`: a literal,
/// a named reference or a union. `None` when `this` must decide itself.
pub(crate) fn subsumes_by_other(
    this: &dyn SchemaNode,
    other: &dyn SchemaNode,
    mine: &Resolver,
    theirs: &Resolver,
) -> Option<MatchResult> {
    let any = other.as_any();
    if let Some(exact) = any.downcast_ref::<ExactValue>() {
        return Some(mine.matches(this, exact.value()));
    }
    if let Some(reference) = any.downcast_ref::<ReferenceNode>() {
        return Some(reference.subsumed_by(this, mine, theirs));
    }
    if let Some(union) = any.downcast_ref::<AnyOfNode>() {
        return Some(union.all_subsumed_by(this, mine, theirs));
    }
    None
}

/// Subsumption failure between unrelated node kinds
#[must_use]
pub(crate) fn kind_mismatch(this: &dyn SchemaNode, other: &dyn SchemaNode, mine: &Resolver) -> MatchResult {
    MatchResult::failure(
        mine.messages()
            .mismatch(&this.type_name(), &other.type_name()),
    )
}

/// Error for an example value its own schema rejects
pub(crate) fn invalid_example(example: &Value, node: &dyn SchemaNode, failure: &Failure) -> EngineError {
    ContractError::InvalidExample {
        example: example.to_string(),
        expected: node.type_name(),
        reason: failure.report().to_string().trim().to_string(),
    }
    .into()
}

/// Scalar nodes of every JSON type other than `except`
pub(crate) fn data_type_negatives(except: &str) -> Vec<Node> {
    let mut nodes: Vec<Node> = Vec::new();
    if except != "string" {
        nodes.push(Arc::new(StringNode::default()));
    }
    if except != "number" {
        nodes.push(Arc::new(NumberNode::default()));
    }
    if except != "boolean" {
        nodes.push(Arc::new(BooleanNode));
    }
    if except != "null" {
        nodes.push(Arc::new(NullNode));
    }
    nodes
}

/// Negatives as a lazy sequence, honoring the data-type switch
pub(crate) fn scalar_negatives(except: &str, config: &NegativeConfig, extra: Vec<Node>) -> NodeSeq {
    let types = if config.data_type_negatives {
        data_type_negatives(except)
    } else {
        Vec::new()
    };
    Box::new(extra.into_iter().chain(types).map(Ok))
}

/// Parse literal text as JSON, falling back to a plain string
#[must_use]
pub(crate) fn parse_json_or_string(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Render a value as facet text (no quotes around strings)
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
