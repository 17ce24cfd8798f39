use std::any::Any;

use serde_json::Value;

use super::{NegativeConfig, Node, NodeSeq, SchemaNode, empty_seq, subsumes_by_other};
use crate::error::{ContractError, EngineError};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;

/// Named type looked up in the resolver's registry when used.
///
/// References are where self-referential schemas loop back, so expansion
/// through a reference is registered with the cycle guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceNode {
    name: String,
}

impl ReferenceNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let bare = name
            .strip_prefix('(')
            .and_then(|n| n.strip_suffix(')'))
            .map_or(name.clone(), str::to_string);
        Self { name: bare }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, resolver: &Resolver) -> Result<Node, ContractError> {
        resolver.resolve_pattern(&self.name)
    }

    /// This reference's target is accepted by `this`. Re-entering the same
    /// type counts as accepted: the recursion has been compared once already.
    pub(crate) fn subsumed_by(&self, this: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        let result = theirs.with_cycle_prevention(&self.name, |inner| {
            let target = self.resolve(inner)?;
            Ok(this.subsumes(target.as_ref(), mine, inner))
        });
        settle(result)
    }
}

fn settle(result: Result<MatchResult, EngineError>) -> MatchResult {
    match result {
        Ok(result) => result,
        Err(EngineError::Cycle(_)) => MatchResult::success(),
        Err(EngineError::Contract(e)) => MatchResult::failure(e.to_string()),
    }
}

impl SchemaNode for ReferenceNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self.resolve(resolver) {
            Ok(target) => resolver.matches(target.as_ref(), value),
            Err(e) => MatchResult::failure(e.to_string()),
        }
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        resolver.with_cycle_prevention(&self.name, |inner| {
            let target = self.resolve(inner)?;
            inner.generate(target.as_ref())
        })
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        let result = resolver.with_cycle_prevention(&self.name, |inner| {
            let target = self.resolve(inner)?;
            Ok(inner.strategy().positive_variants(&target, row, inner))
        });
        match result {
            Ok(variants) => variants,
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn negative_variants(&self, row: &Row, resolver: &Resolver, _config: &NegativeConfig) -> NodeSeq {
        let result = resolver.with_cycle_prevention(&self.name, |inner| {
            let target = self.resolve(inner)?;
            Ok(inner.strategy().negative_variants(&target, row, inner))
        });
        match result {
            Ok(variants) => variants,
            Err(EngineError::Cycle(_)) => empty_seq(),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if other.as_any().downcast_ref::<ReferenceNode>().is_none() {
            if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
                return result;
            }
        }
        let result = mine.with_cycle_prevention(&self.name, |inner| {
            let target = self.resolve(inner)?;
            Ok(target.subsumes(other, inner, theirs))
        });
        settle(result)
    }

    fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        self.resolve(resolver)?.parse(text, resolver)
    }

    fn type_name(&self) -> String {
        self.name.clone()
    }

    fn type_alias(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Value taken from the fact store when the fact exists.
#[derive(Debug, Clone)]
pub struct FactLookupNode {
    pub fact: String,
    pub fallback: Node,
}

impl FactLookupNode {
    #[must_use]
    pub fn new(fact: impl Into<String>, fallback: Node) -> Self {
        Self {
            fact: fact.into(),
            fallback,
        }
    }

    fn fact_node(&self, resolver: &Resolver) -> Option<Result<Node, ContractError>> {
        resolver.fact(&self.fact).map(|value| resolver.node_from_value(value))
    }
}

impl SchemaNode for FactLookupNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self.fact_node(resolver) {
            Some(Ok(node)) => resolver.matches(node.as_ref(), value),
            Some(Err(e)) => MatchResult::failure(e.to_string()),
            None => resolver.matches(self.fallback.as_ref(), value),
        }
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        match self.fact_node(resolver) {
            Some(node) => resolver.generate(node?.as_ref()),
            None => resolver.generate(self.fallback.as_ref()),
        }
    }

    fn variants_from_example(&self, _row: &Row, _resolver: &Resolver) -> NodeSeq {
        super::once(std::sync::Arc::new(self.clone()))
    }

    fn negative_variants(&self, row: &Row, resolver: &Resolver, _config: &NegativeConfig) -> NodeSeq {
        resolver.strategy().negative_variants(&self.fallback, row, resolver)
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        self.fallback.subsumes(other, mine, theirs)
    }

    fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        self.fallback.parse(text, resolver)
    }

    fn type_name(&self) -> String {
        self.fallback.type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Field, NumberNode, ObjectNode, StringNode};
    use crate::strategy::Generative;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// `Tree { value: number, child?: Tree }`
    fn tree_resolver() -> Resolver {
        let tree = ObjectNode::new(BTreeMap::from([
            ("value".to_string(), Field::mandatory(Arc::new(NumberNode::default()))),
            ("child".to_string(), Field::optional(Arc::new(ReferenceNode::new("(Tree)")))),
        ]));
        Resolver::new().with_pattern("Tree", Arc::new(tree))
    }

    fn depth(value: &Value) -> usize {
        value.get("child").map_or(1, |c| 1 + depth(c))
    }

    #[test]
    fn self_reference_nests_exactly_once() {
        let r = tree_resolver();
        let value = ReferenceNode::new("Tree").generate(&r).unwrap();
        assert_eq!(depth(&value), 2);
        assert!(value["child"].get("child").is_none());
    }

    #[test]
    fn lookup_path_guard_also_terminates() {
        let r = tree_resolver().with_all_patterns_mandatory(true);
        let value = ReferenceNode::new("Tree").generate(&r).unwrap();
        assert_eq!(depth(&value), 2);
    }

    #[test]
    fn self_reference_variants_terminate() {
        let r = tree_resolver().with_strategy(Arc::new(Generative::new()));
        let variants: Vec<Node> = ReferenceNode::new("Tree")
            .variants_from_example(&Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!variants.is_empty());
    }

    #[test]
    fn recursive_types_subsume_themselves() {
        let r = tree_resolver();
        let tree = ReferenceNode::new("Tree");
        assert!(tree.subsumes(&tree, &r, &r).is_success());
    }

    #[test]
    fn unknown_reference_fails_to_match() {
        let r = Resolver::new();
        let result = ReferenceNode::new("Missing").matches(&json!({}), &r);
        assert_eq!(result.as_failure().unwrap().message, "Unknown pattern (Missing)");
    }

    #[test]
    fn fact_value_wins_over_fallback() {
        let node = FactLookupNode::new("id", Arc::new(StringNode::default()));
        let r = Resolver::new().with_facts(BTreeMap::from([("id".to_string(), json!("abc"))]));
        assert_eq!(node.generate(&r).unwrap(), json!("abc"));
        assert!(node.matches(&json!("abc"), &r).is_success());
        assert!(!node.matches(&json!("xyz"), &r).is_success());
        assert!(node.generate(&Resolver::new()).unwrap().is_string());
    }
}
