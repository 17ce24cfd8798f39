//! Generation strategies: how many variants of a schema to test

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::EngineError;
use crate::key_check::KeyPolicy;
use crate::node::combine::key_subsets;
use crate::node::{LazySeq, NegativeConfig, Node, NodeSeq, SchemaNode, exact, value_to_text};
use crate::resolver::Resolver;
use crate::row::Row;

/// Policy for variant generation, consulted by nodes and patterns.
pub trait GenerationStrategy: fmt::Debug + Send + Sync {
    fn is_generative(&self) -> bool;

    /// Positive variants of `node` for one example row
    fn positive_variants(&self, node: &Node, row: &Row, resolver: &Resolver) -> NodeSeq {
        node.variants_from_example(row, resolver)
    }

    /// Negative variants of `node`; every one is rejected by `node`
    fn negative_variants(&self, node: &Node, row: &Row, resolver: &Resolver) -> NodeSeq;

    /// Like [`negative_variants`](Self::negative_variants), for values sent as
    /// text (path, query, headers): a candidate whose text still parses as a
    /// valid value is dropped too.
    fn negative_text_variants(&self, node: &Node, row: &Row, resolver: &Resolver) -> NodeSeq;

    /// Key sets to generate for an object or keyed facet
    fn key_combinations(&self, mandatory: Vec<String>, optional: Vec<String>) -> LazySeq<Vec<String>>;

    /// Request body variants for one example row
    fn request_bodies(&self, body: &Node, row: &Row, resolver: &Resolver) -> NodeSeq;
}

/// Only what the examples say: one variant per row, no negatives.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonGenerative;

impl GenerationStrategy for NonGenerative {
    fn is_generative(&self) -> bool {
        false
    }

    fn negative_variants(&self, _node: &Node, _row: &Row, _resolver: &Resolver) -> NodeSeq {
        Box::new(std::iter::empty())
    }

    fn negative_text_variants(&self, _node: &Node, _row: &Row, _resolver: &Resolver) -> NodeSeq {
        Box::new(std::iter::empty())
    }

    fn key_combinations(&self, mandatory: Vec<String>, optional: Vec<String>) -> LazySeq<Vec<String>> {
        let mut keys = mandatory;
        keys.extend(optional);
        Box::new(std::iter::once(keys))
    }

    fn request_bodies(&self, body: &Node, row: &Row, resolver: &Resolver) -> NodeSeq {
        body.variants_from_example(&row.for_body(), resolver)
    }
}

/// Structurally distinct variants plus negatives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generative {
    /// Cap on optional-key subsets per object or facet
    pub max_key_combinations: Option<usize>,
    pub negative: NegativeConfig,
}

impl Generative {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_key_combinations(mut self, cap: usize) -> Self {
        self.max_key_combinations = Some(cap);
        self
    }

    /// Keep negatives the original node really rejects.
    ///
    /// A candidate is dropped when the original subsumes it, when it
    /// subsumes one of the original's positive variants, or when a value
    /// generated from it is still accepted (as text for facet values).
    fn checked_negatives(
        &self,
        node: &Node,
        row: &Row,
        resolver: &Resolver,
        as_text: bool,
    ) -> NodeSeq {
        let original = node.clone();
        let negative_resolver = resolver.with_negative(true);
        let check_resolver = resolver
            .with_strategy(Arc::new(*self))
            .with_key_policy(KeyPolicy::strict());
        let mut witnesses: Option<Vec<Node>> = None;
        let candidates = node.negative_variants(row, &negative_resolver, &self.negative);
        Box::new(candidates.filter_map(move |candidate| {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(EngineError::Cycle(_)) => return None,
                Err(e) => return Some(Err(e)),
            };
            let witnesses = witnesses.get_or_insert_with(|| accepted_witnesses(&original, &check_resolver));
            if overlaps(&original, &candidate, witnesses, &check_resolver) {
                tracing::debug!(
                    candidate = %candidate.type_name(),
                    "discarding negative variant that overlaps the original schema"
                );
                return None;
            }
            let value = match negative_resolver.generate(candidate.as_ref()) {
                Ok(value) => value,
                Err(EngineError::Cycle(_)) => return None,
                Err(e) => return Some(Err(e)),
            };
            let still_valid = if as_text {
                negative_resolver
                    .matches_text(original.as_ref(), &value_to_text(&value))
                    .is_success()
            } else {
                negative_resolver.matches(original.as_ref(), &value).is_success()
            };
            if still_valid {
                tracing::debug!(
                    candidate = %candidate.type_name(),
                    "discarding negative variant accepted by the original schema"
                );
                None
            } else {
                Some(Ok(candidate))
            }
        }))
    }
}

/// Largest number of positive variants a negative is checked against
const MAX_WITNESSES: usize = 64;

/// Positive variants of `node`: enum members, union branches, key subsets
fn accepted_witnesses(node: &Node, resolver: &Resolver) -> Vec<Node> {
    node.variants_from_example(&Row::empty(), resolver)
        .filter_map(Result::ok)
        .take(MAX_WITNESSES)
        .collect()
}

/// Whether `candidate` admits any value `original` accepts
fn overlaps(original: &Node, candidate: &Node, witnesses: &[Node], resolver: &Resolver) -> bool {
    original.subsumes(candidate.as_ref(), resolver, resolver).is_success()
        || witnesses
            .iter()
            .any(|w| candidate.subsumes(w.as_ref(), resolver, resolver).is_success())
}

impl GenerationStrategy for Generative {
    fn is_generative(&self) -> bool {
        true
    }

    fn negative_variants(&self, node: &Node, row: &Row, resolver: &Resolver) -> NodeSeq {
        self.checked_negatives(node, row, resolver, false)
    }

    fn negative_text_variants(&self, node: &Node, row: &Row, resolver: &Resolver) -> NodeSeq {
        self.checked_negatives(node, row, resolver, true)
    }

    fn key_combinations(&self, mandatory: Vec<String>, optional: Vec<String>) -> LazySeq<Vec<String>> {
        key_subsets(mandatory, optional, self.max_key_combinations)
    }

    /// Example-anchored variants, then schema-only variants no anchored one
    /// covers, then the literal example if nothing generated covers it.
    fn request_bodies(&self, body: &Node, row: &Row, resolver: &Resolver) -> NodeSeq {
        let body_row = row.for_body();
        let Some(example) = body_row.current().cloned() else {
            return body.variants_from_example(&body_row, resolver);
        };

        let mut anchored: Vec<Node> = Vec::new();
        let mut errors: Vec<EngineError> = Vec::new();
        for variant in body.variants_from_example(&body_row, resolver) {
            match variant {
                Ok(node) => anchored.push(node),
                Err(EngineError::Cycle(_)) => {}
                Err(e) => errors.push(e),
            }
        }

        let seen: Rc<RefCell<Vec<Node>>> = Rc::new(RefCell::new(anchored.clone()));
        let vanilla_seen = Rc::clone(&seen);
        let vanilla_resolver = resolver.clone();
        let vanilla = body
            .variants_from_example(&Row::empty(), resolver)
            .filter_map(move |variant| match variant {
                Ok(node) => {
                    let covered = vanilla_seen
                        .borrow()
                        .iter()
                        .any(|a| a.subsumes(node.as_ref(), &vanilla_resolver, &vanilla_resolver).is_success());
                    if covered {
                        None
                    } else {
                        vanilla_seen.borrow_mut().push(node.clone());
                        Some(Ok(node))
                    }
                }
                Err(EngineError::Cycle(_)) => None,
                Err(e) => Some(Err(e)),
            });

        let literal_resolver = resolver.clone();
        let literal = std::iter::once(()).filter_map(move |()| {
            let literal = exact(example.clone());
            let covered = seen
                .borrow()
                .iter()
                .any(|g| g.subsumes(literal.as_ref(), &literal_resolver, &literal_resolver).is_success());
            (!covered).then_some(Ok(literal))
        });

        Box::new(
            errors
                .into_iter()
                .map(Err)
                .chain(anchored.into_iter().map(Ok))
                .chain(vanilla)
                .chain(literal),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;
    use crate::node::{AnyOfNode, EnumNode, ExactValue, Field, NumberNode, ObjectNode, StringNode};
    use crate::result::MatchResult;
    use crate::row::REQUEST_BODY_COLUMN;
    use serde_json::{Value, json};
    use std::any::Any;
    use std::collections::BTreeMap;

    fn person() -> Node {
        Arc::new(ObjectNode::new(BTreeMap::from([
            ("name".to_string(), Field::mandatory(Arc::new(StringNode::default()))),
            ("age".to_string(), Field::optional(Arc::new(NumberNode::default()))),
        ])))
    }

    fn generative() -> Resolver {
        Resolver::new().with_strategy(Arc::new(Generative::new()))
    }

    /// Body whose variants are fixed literals: `anchored` when the row has an
    /// example, `vanilla` otherwise
    #[derive(Debug)]
    struct Scripted {
        anchored: Vec<Value>,
        vanilla: Vec<Value>,
    }

    impl SchemaNode for Scripted {
        fn matches(&self, value: &Value, _resolver: &Resolver) -> MatchResult {
            if self.anchored.iter().chain(&self.vanilla).any(|v| v == value) {
                MatchResult::success()
            } else {
                MatchResult::failure(format!("unscripted {value}"))
            }
        }

        fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
            Ok(self.vanilla[0].clone())
        }

        fn variants_from_example(&self, row: &Row, _resolver: &Resolver) -> NodeSeq {
            let values = if row.current().is_some() { &self.anchored } else { &self.vanilla };
            Box::new(values.clone().into_iter().map(|v| Ok(exact(v))))
        }

        fn negative_variants(&self, _row: &Row, _resolver: &Resolver, _config: &NegativeConfig) -> NodeSeq {
            Box::new(std::iter::empty())
        }

        fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, _theirs: &Resolver) -> MatchResult {
            match other.as_any().downcast_ref::<ExactValue>() {
                Some(literal) => self.matches(literal.value(), mine),
                None => MatchResult::failure("not a literal"),
            }
        }

        fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
            Ok(Value::String(text.to_string()))
        }

        fn type_name(&self) -> String {
            "scripted".to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn body_row(example: &str) -> Row {
        Row::new("ex", BTreeMap::from([(REQUEST_BODY_COLUMN.to_string(), example.to_string())]))
    }

    fn body_values(body: Node, row: &Row) -> Vec<Value> {
        let r = generative();
        Generative::new()
            .request_bodies(&body, row, &r)
            .map(|node| node.unwrap().generate(&r).unwrap())
            .collect()
    }

    #[test]
    fn non_generative_has_no_negatives() {
        let r = Resolver::new();
        assert_eq!(NonGenerative.negative_variants(&person(), &Row::empty(), &r).count(), 0);
    }

    #[test]
    fn non_generative_uses_every_key_once() {
        let combos: Vec<_> = NonGenerative
            .key_combinations(vec!["a".into()], vec!["b".into()])
            .collect();
        assert_eq!(combos, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn every_negative_is_rejected_by_the_original() {
        let r = generative();
        let node = person();
        let negatives: Vec<Node> = Generative::new()
            .negative_variants(&node, &Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!negatives.is_empty());
        for negative in negatives {
            let value = negative.generate(&r).unwrap();
            assert!(!r.matches(node.as_ref(), &value).is_success(), "{value} was accepted");
        }
    }

    #[test]
    fn text_negatives_drop_parseable_candidates() {
        let r = generative();
        let node: Node = Arc::new(StringNode::default());
        let negatives: Vec<Node> = Generative::new()
            .negative_text_variants(&node, &Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(negatives.is_empty());
    }

    #[test]
    fn literal_example_kept_when_not_covered() {
        let r = generative();
        let body: Node = Arc::new(AnyOfNode::new(vec![
            Arc::new(NumberNode::default()),
            Arc::new(StringNode::default()),
        ]));
        let row = Row::new(
            "ex",
            BTreeMap::from([(REQUEST_BODY_COLUMN.to_string(), "10".to_string())]),
        );
        let bodies: Vec<Node> = Generative::new()
            .request_bodies(&body, &row, &r)
            .collect::<Result<_, _>>()
            .unwrap();
        let covers_example = bodies
            .iter()
            .any(|b| r.matches(b.as_ref(), &json!(10)).is_success());
        assert!(covers_example);
    }

    #[test]
    fn bodies_are_anchored_then_uncovered_vanilla_then_literal() {
        let body: Node = Arc::new(Scripted {
            anchored: vec![json!({"a": 1})],
            vanilla: vec![json!({"a": 1}), json!({"b": 2})],
        });
        assert_eq!(
            body_values(body, &body_row(r#"{"c": 3}"#)),
            vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]
        );
    }

    #[test]
    fn literal_example_emitted_when_nothing_covers_it() {
        let body: Node = Arc::new(Scripted {
            anchored: Vec::new(),
            vanilla: vec![json!({"b": 2})],
        });
        let values = body_values(body, &body_row(r#"{"c": 3}"#));
        assert_eq!(values.last(), Some(&json!({"c": 3})));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn covered_literal_is_not_repeated() {
        let body: Node = Arc::new(Scripted {
            anchored: vec![json!({"c": 3})],
            vanilla: vec![json!({"b": 2})],
        });
        assert_eq!(
            body_values(body, &body_row(r#"{"c": 3}"#)),
            vec![json!({"c": 3}), json!({"b": 2})]
        );
    }

    #[test]
    fn mixed_enum_negatives_admit_no_member() {
        let r = generative();
        let node: Node = Arc::new(EnumNode::new(vec![json!("a"), json!(1)]));
        let negatives: Vec<Node> = Generative::new()
            .negative_variants(&node, &Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(!negatives.is_empty());
        for negative in &negatives {
            for member in [json!("a"), json!(1)] {
                assert!(
                    !r.matches(negative.as_ref(), &member).is_success(),
                    "{} admits {member}",
                    negative.type_name()
                );
            }
        }
    }
}
