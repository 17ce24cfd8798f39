use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use super::{
    NegativeConfig, Node, NodeSeq, NullNode, SchemaNode, invalid_example, mismatch, once,
    subsumes_by_other,
};
use crate::error::{ContractError, EngineError};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

/// Union: a value must match at least one branch.
#[derive(Debug, Clone)]
pub struct AnyOfNode {
    pub branches: Vec<Node>,
}

impl AnyOfNode {
    #[must_use]
    pub fn new(branches: Vec<Node>) -> Self {
        Self { branches }
    }

    /// `node` or null
    #[must_use]
    pub fn nullable(node: Node) -> Self {
        Self {
            branches: vec![node, Arc::new(NullNode)],
        }
    }

    /// Every branch of this union is accepted by `this`
    pub(crate) fn all_subsumed_by(&self, this: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        let failures = self
            .branches
            .iter()
            .filter_map(|branch| this.subsumes(branch.as_ref(), mine, theirs).into_failure())
            .collect();
        Failure::result_of(failures)
    }
}

impl SchemaNode for AnyOfNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let mut failures = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            match resolver.matches(branch.as_ref(), value) {
                MatchResult::Success(s) => return MatchResult::Success(s),
                MatchResult::Failure(f) => failures.push(f),
            }
        }
        // A branch that failed below the top level understood the value's
        // shape; its diagnosis is more useful than a type list.
        match failures.into_iter().find(|f| !f.causes.is_empty() || !f.breadcrumb.is_empty()) {
            Some(deep) => MatchResult::Failure(deep),
            None => mismatch(&self.type_name(), value, resolver),
        }
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        let mut last_cycle = None;
        for branch in &self.branches {
            match resolver.generate(branch.as_ref()) {
                Err(EngineError::Cycle(signal)) => last_cycle = Some(signal),
                other => return other,
            }
        }
        match last_cycle {
            Some(signal) => Err(signal.into()),
            None => Err(ContractError::Ungeneratable("empty union".into()).into()),
        }
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        if let Some(example) = row.current() {
            let fitting = self
                .branches
                .iter()
                .find(|b| resolver.matches(b.as_ref(), example).is_success());
            return match fitting {
                Some(branch) => resolver.strategy().positive_variants(branch, row, resolver),
                None => {
                    let failure = match self.matches(example, resolver) {
                        MatchResult::Failure(f) => f,
                        MatchResult::Success(_) => Failure::default(),
                    };
                    Box::new(std::iter::once(Err(invalid_example(example, self, &failure))))
                }
            };
        }
        if !resolver.is_generative() {
            return once(Arc::new(self.clone()));
        }
        let branches = self.branches.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        Box::new(
            branches
                .into_iter()
                .flat_map(move |branch| resolver.strategy().positive_variants(&branch, &row, &resolver)),
        )
    }

    fn negative_variants(&self, row: &Row, resolver: &Resolver, _config: &NegativeConfig) -> NodeSeq {
        let branches = self.branches.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        Box::new(
            branches
                .into_iter()
                .flat_map(move |branch| resolver.strategy().negative_variants(&branch, &row, &resolver)),
        )
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        if self
            .branches
            .iter()
            .any(|b| b.subsumes(other, mine, theirs).is_success())
        {
            MatchResult::success()
        } else {
            MatchResult::failure(
                mine.messages()
                    .mismatch(&self.type_name(), &other.type_name()),
            )
        }
    }

    fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        self.branches
            .iter()
            .filter_map(|b| b.parse(text, resolver).ok())
            .find(|value| self.matches(value, resolver).is_success())
            .ok_or_else(|| ContractError::Parse {
                text: text.to_string(),
                expected: self.type_name(),
            })
    }

    fn type_name(&self) -> String {
        let names: Vec<String> = self.branches.iter().map(|b| b.type_name()).collect();
        names.join(" or ")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExactValue, NumberNode, StringNode};
    use crate::strategy::Generative;
    use serde_json::json;

    fn number_or_null() -> AnyOfNode {
        AnyOfNode::nullable(Arc::new(NumberNode::default()))
    }

    #[test]
    fn matches_any_branch() {
        let r = Resolver::new();
        assert!(number_or_null().matches(&json!(1), &r).is_success());
        assert!(number_or_null().matches(&json!(null), &r).is_success());
        let failure = number_or_null().matches(&json!("x"), &r);
        assert_eq!(
            failure.as_failure().unwrap().message,
            "Expected number or null, actual was \"x\" (string)"
        );
    }

    #[test]
    fn generative_variants_are_the_branches() {
        let r = Resolver::new().with_strategy(Arc::new(Generative::new()));
        let variants: Vec<Node> = number_or_null()
            .variants_from_example(&Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].generate(&r).unwrap(), json!(null));
    }

    #[test]
    fn union_subsumes_its_branches() {
        let r = Resolver::new();
        let union = number_or_null();
        assert!(union.subsumes(&NullNode, &r, &r).is_success());
        assert!(union.subsumes(&ExactValue::new(json!(3)), &r, &r).is_success());
        assert!(!union.subsumes(&StringNode::default(), &r, &r).is_success());
        assert!(!NumberNode::default().subsumes(&union, &r, &r).is_success());
    }

    #[test]
    fn parses_through_branches() {
        let r = Resolver::new();
        assert_eq!(number_or_null().parse("12", &r).unwrap(), json!(12));
        assert_eq!(number_or_null().parse("null", &r).unwrap(), json!(null));
    }
}
