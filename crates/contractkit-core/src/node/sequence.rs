use std::any::Any;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value;

use super::combine::all_or_nothing;
use super::{
    NegativeConfig, Node, NodeSeq, SchemaNode, data_type_negatives, invalid_example,
    kind_mismatch, mismatch, subsumes_by_other,
};
use crate::error::{ContractError, EngineError};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

const MAX_GENERATED_ITEMS: usize = 3;

fn index_crumb(index: usize) -> String {
    format!("[{index}]")
}

fn parse_array(text: &str, type_name: String) -> Result<Value, ContractError> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Array(_)) => Ok(value),
        _ => Err(ContractError::Parse {
            text: text.to_string(),
            expected: type_name,
        }),
    }
}

/// JSON array whose elements all match one node.
#[derive(Debug, Clone)]
pub struct ListNode {
    pub item: Node,
}

impl ListNode {
    #[must_use]
    pub fn new(item: Node) -> Self {
        Self { item }
    }
}

impl SchemaNode for ListNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Array(items) = value else {
            return mismatch("json array", value, resolver);
        };
        let failures = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                resolver
                    .with_lookup_index(i)
                    .matches(self.item.as_ref(), item)
                    .into_failure()
                    .map(|f| f.breadcrumb(index_crumb(i)))
            })
            .collect();
        Failure::result_of(failures)
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        let count = rand::thread_rng().gen_range(1..=MAX_GENERATED_ITEMS);
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            match resolver.with_lookup_index(i).generate(self.item.as_ref()) {
                Ok(value) => items.push(value),
                Err(EngineError::Cycle(signal)) => {
                    tracing::debug!(%signal, "generating an empty list to break a cycle");
                    return Ok(Value::Array(Vec::new()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Value::Array(items))
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        if let Some(example) = row.current() {
            let Value::Array(items) = example else {
                return Box::new(std::iter::once(Err(ContractError::InvalidExample {
                    example: example.to_string(),
                    expected: self.type_name(),
                    reason: "not a JSON array".into(),
                }
                .into())));
            };
            if let MatchResult::Failure(f) = resolver.matches(self, example) {
                return Box::new(std::iter::once(Err(invalid_example(example, self, &f))));
            }
            let mut positions = Vec::with_capacity(items.len());
            for i in 0..items.len() {
                let candidates: Result<Vec<Node>, EngineError> = resolver
                    .strategy()
                    .positive_variants(&self.item, &row.index(i), &resolver.with_lookup_index(i))
                    .collect();
                match candidates {
                    Ok(candidates) => positions.push(candidates),
                    Err(e) => return Box::new(std::iter::once(Err(e))),
                }
            }
            return Box::new(
                all_or_nothing(&positions)
                    .into_iter()
                    .map(|items| Ok(Arc::new(TupleNode::new(items)) as Node)),
            );
        }

        let item_resolver = resolver.with_lookup_index(0);
        let variants = resolver
            .strategy()
            .positive_variants(&self.item, row, &item_resolver);
        Box::new(variants.map(|variant| match variant {
            Ok(item) => Ok(Arc::new(ListNode::new(item)) as Node),
            Err(EngineError::Cycle(_)) => Ok(Arc::new(TupleNode::new(Vec::new())) as Node),
            Err(e) => Err(e),
        }))
    }

    fn negative_variants(&self, row: &Row, resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let item_negatives = resolver
            .strategy()
            .negative_variants(&self.item, &row.index(0), &resolver.with_lookup_index(0))
            .map(|negative| negative.map(|item| Arc::new(ListNode::new(item)) as Node));
        let types = if config.data_type_negatives {
            data_type_negatives("array")
        } else {
            Vec::new()
        };
        Box::new(item_negatives.chain(types.into_iter().map(Ok)))
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let any = other.as_any();
        if let Some(list) = any.downcast_ref::<ListNode>() {
            return self
                .item
                .subsumes(list.item.as_ref(), mine, theirs)
                .breadcrumb("[]");
        }
        if let Some(tuple) = any.downcast_ref::<TupleNode>() {
            let failures = tuple
                .items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    self.item
                        .subsumes(item.as_ref(), mine, theirs)
                        .into_failure()
                        .map(|f| f.breadcrumb(index_crumb(i)))
                })
                .collect();
            return Failure::result_of(failures);
        }
        kind_mismatch(self, other, mine)
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        parse_array(text, self.type_name())
    }

    fn type_name(&self) -> String {
        format!("list of {}", self.item.type_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// JSON array of a fixed length with one node per position.
#[derive(Debug, Clone)]
pub struct TupleNode {
    pub items: Vec<Node>,
}

impl TupleNode {
    #[must_use]
    pub fn new(items: Vec<Node>) -> Self {
        Self { items }
    }
}

impl SchemaNode for TupleNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Array(items) = value else {
            return mismatch(&self.type_name(), value, resolver);
        };
        if items.len() != self.items.len() {
            return MatchResult::failure(format!(
                "Expected an array of length {}, actual length {}",
                self.items.len(),
                items.len()
            ));
        }
        let failures = self
            .items
            .iter()
            .zip(items)
            .enumerate()
            .filter_map(|(i, (node, item))| {
                resolver
                    .with_lookup_index(i)
                    .matches(node.as_ref(), item)
                    .into_failure()
                    .map(|f| f.breadcrumb(index_crumb(i)))
            })
            .collect();
        Failure::result_of(failures)
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, node)| resolver.with_lookup_index(i).generate(node.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        let mut positions = Vec::with_capacity(self.items.len());
        for (i, node) in self.items.iter().enumerate() {
            let candidates: Result<Vec<Node>, EngineError> = resolver
                .strategy()
                .positive_variants(node, &row.index(i), &resolver.with_lookup_index(i))
                .collect();
            match candidates {
                Ok(candidates) => positions.push(candidates),
                Err(e) => return Box::new(std::iter::once(Err(e))),
            }
        }
        Box::new(
            all_or_nothing(&positions)
                .into_iter()
                .map(|items| Ok(Arc::new(TupleNode::new(items)) as Node)),
        )
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let types = if config.data_type_negatives {
            data_type_negatives("array")
        } else {
            Vec::new()
        };
        Box::new(types.into_iter().map(Ok))
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        match other.as_any().downcast_ref::<TupleNode>() {
            Some(tuple) if tuple.items.len() == self.items.len() => {
                let failures = self
                    .items
                    .iter()
                    .zip(&tuple.items)
                    .enumerate()
                    .filter_map(|(i, (a, b))| {
                        a.subsumes(b.as_ref(), mine, theirs)
                            .into_failure()
                            .map(|f| f.breadcrumb(index_crumb(i)))
                    })
                    .collect();
                Failure::result_of(failures)
            }
            _ => kind_mismatch(self, other, mine),
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        parse_array(text, self.type_name())
    }

    fn type_name(&self) -> String {
        format!("json array of length {}", self.items.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
