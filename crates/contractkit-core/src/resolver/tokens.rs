//! `(token)` values in stubs and facts
//!
//! `(number)` stands for "any number", `(Person)` for any value of a
//! registered type, `(number?)` for a number or null and `(number*)` for a
//! list of numbers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::Resolver;
use crate::error::ContractError;
use crate::node::{
    AnyOfNode, AnyValueNode, BooleanNode, ExactValue, Field, ListNode, Node, NullNode, NumberNode,
    ObjectNode, StringNode, TupleNode, exact,
};

#[must_use]
pub fn is_pattern_token(text: &str) -> bool {
    let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
        return false;
    };
    let name = inner.trim_end_matches(['?', '*']);
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Built-in scalar type by bare name
#[must_use]
pub fn builtin_pattern(name: &str) -> Option<Node> {
    let node: Node = match name {
        "string" => Arc::new(StringNode::default()),
        "number" => Arc::new(NumberNode::default()),
        "integer" => Arc::new(NumberNode::integer()),
        "boolean" | "bool" => Arc::new(BooleanNode),
        "null" => Arc::new(NullNode),
        "anyvalue" => Arc::new(AnyValueNode),
        "emptystring" => exact(Value::String(String::new())),
        _ => return None,
    };
    Some(node)
}

pub(super) fn token_node(token: &str, resolver: &Resolver) -> Result<Node, ContractError> {
    let inner = token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(token);
    if let Some(base) = inner.strip_suffix('?') {
        let node = resolver.resolve_pattern(base)?;
        return Ok(Arc::new(AnyOfNode::nullable(node)));
    }
    if let Some(base) = inner.strip_suffix('*') {
        let node = resolver.resolve_pattern(base)?;
        return Ok(Arc::new(ListNode::new(node)));
    }
    resolver.resolve_pattern(inner)
}

pub(super) fn node_from_value(value: &Value, resolver: &Resolver) -> Result<Node, ContractError> {
    match value {
        Value::String(text) if is_pattern_token(text) => token_node(text, resolver),
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (key, child) in map {
                fields.insert(key.clone(), Field::mandatory(node_from_value(child, resolver)?));
            }
            Ok(Arc::new(ObjectNode::new(fields)))
        }
        Value::Array(items) if contains_token(value) => {
            let nodes = items
                .iter()
                .map(|item| node_from_value(item, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(TupleNode::new(nodes)))
        }
        other => Ok(Arc::new(ExactValue::new(other.clone()))),
    }
}

fn contains_token(value: &Value) -> bool {
    match value {
        Value::String(text) => is_pattern_token(text),
        Value::Array(items) => items.iter().any(contains_token),
        Value::Object(map) => map.values().any(contains_token),
        _ => false,
    }
}
