use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::combine::all_or_nothing;
use super::{
    NegativeConfig, Node, NodeSeq, SchemaNode, data_type_negatives, invalid_example,
    kind_mismatch, mismatch, subsumes_by_other,
};
use crate::error::{ContractError, EngineError};
use crate::key_check::{KeyError, exact_key};
use crate::resolver::Resolver;
use crate::result::{Failure, MatchResult};
use crate::row::Row;

/// One declared key of an object.
#[derive(Debug, Clone)]
pub struct Field {
    pub node: Node,
    pub optional: bool,
}

impl Field {
    #[must_use]
    pub fn mandatory(node: Node) -> Self {
        Self {
            node,
            optional: false,
        }
    }

    #[must_use]
    pub fn optional(node: Node) -> Self {
        Self {
            node,
            optional: true,
        }
    }
}

/// JSON object with declared keys and an optional schema for extra keys.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    pub fields: BTreeMap<String, Field>,
    pub additional: Option<Node>,
}

impl ObjectNode {
    #[must_use]
    pub fn new(fields: BTreeMap<String, Field>) -> Self {
        Self {
            fields,
            additional: None,
        }
    }

    #[must_use]
    pub fn with_additional(mut self, node: Node) -> Self {
        self.additional = Some(node);
        self
    }

    fn mandatory_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.optional)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn optional_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, f)| f.optional)
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn generate_field(key: &str, field: &Field, resolver: &Resolver) -> Result<Option<Value>, EngineError> {
        let child = resolver.with_lookup_key(key);
        match child.generate(field.node.as_ref()) {
            Ok(value) => Ok(Some(value)),
            Err(EngineError::Cycle(signal)) => {
                if child.all_patterns_mandatory() {
                    match child.with_cycle_marker().generate(field.node.as_ref()) {
                        Ok(value) => return Ok(Some(value)),
                        Err(EngineError::Cycle(_)) if field.optional => return Ok(None),
                        Err(e) => return Err(e),
                    }
                }
                if field.optional {
                    tracing::debug!(%signal, key, "omitting optional key to break a cycle");
                    Ok(None)
                } else {
                    Err(signal.into())
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Variants for one key set; empty when a mandatory key has no candidate
    fn variants_for_keys(
        &self,
        keys: &[String],
        row: &Row,
        resolver: &Resolver,
    ) -> Result<Vec<Node>, EngineError> {
        let mut names = Vec::new();
        let mut positions: Vec<Vec<Node>> = Vec::new();
        for key in keys {
            let Some(field) = self.fields.get(key) else {
                continue;
            };
            let child_resolver = resolver.with_lookup_key(key);
            let child_row = row.child(key);
            let mut candidates = Vec::new();
            for variant in resolver
                .strategy()
                .positive_variants(&field.node, &child_row, &child_resolver)
            {
                match variant {
                    Ok(node) => candidates.push(node),
                    Err(EngineError::Cycle(_)) if field.optional => {}
                    Err(e) => return Err(e),
                }
            }
            if candidates.is_empty() {
                if field.optional {
                    continue;
                }
                return Ok(Vec::new());
            }
            names.push(key.clone());
            positions.push(candidates);
        }

        Ok(all_or_nothing(&positions)
            .into_iter()
            .map(|combination| {
                let fields = names
                    .iter()
                    .cloned()
                    .zip(combination)
                    .map(|(key, node)| (key, Field::mandatory(node)))
                    .collect();
                Arc::new(Self {
                    fields,
                    additional: self.additional.clone(),
                }) as Node
            })
            .collect())
    }

    /// Object with `key` replaced by `node`, other keys as declared
    fn with_field(&self, key: &str, node: Node) -> Node {
        let mut fields: BTreeMap<String, Field> = self
            .fields
            .iter()
            .filter(|(_, f)| !f.optional)
            .map(|(k, f)| (k.clone(), f.clone()))
            .collect();
        fields.insert(key.to_string(), Field::mandatory(node));
        Arc::new(Self {
            fields,
            additional: self.additional.clone(),
        })
    }

    fn without_field(&self, key: &str) -> Node {
        let fields = self
            .fields
            .iter()
            .filter(|(k, f)| !f.optional && k.as_str() != key)
            .map(|(k, f)| (k.clone(), f.clone()))
            .collect();
        Arc::new(Self {
            fields,
            additional: self.additional.clone(),
        })
    }
}

impl SchemaNode for ObjectNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(map) = value else {
            return mismatch("json object", value, resolver);
        };

        let actual: Vec<&str> = map.keys().map(String::as_str).collect();
        let mut failures: Vec<Failure> = resolver
            .key_policy()
            .check(
                self.fields.iter().map(|(k, f)| (k.as_str(), f.optional)),
                &actual,
                self.additional.is_some(),
                exact_key,
            )
            .iter()
            .map(|e: &KeyError| e.to_failure("key", resolver.messages()))
            .collect();

        for (key, item) in map {
            let child = resolver.with_lookup_key(key);
            let result = match (self.fields.get(key), &self.additional) {
                (Some(field), _) => child.matches(field.node.as_ref(), item),
                (None, Some(additional)) => child.matches(additional.as_ref(), item),
                (None, None) => continue,
            };
            if let MatchResult::Failure(f) = result {
                failures.push(f.breadcrumb(key.as_str()));
            }
        }

        Failure::result_of(failures)
    }

    fn generate(&self, resolver: &Resolver) -> Result<Value, EngineError> {
        let mut map = Map::new();
        for (key, field) in &self.fields {
            if let Some(value) = Self::generate_field(key, field, resolver)? {
                map.insert(key.clone(), value);
            }
        }
        Ok(Value::Object(map))
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        if let Some(example) = row.current() {
            if !example.is_object() {
                return Box::new(std::iter::once(Err(ContractError::InvalidExample {
                    example: example.to_string(),
                    expected: self.type_name(),
                    reason: "not a JSON object".into(),
                }
                .into())));
            }
            if let MatchResult::Failure(f) = resolver.matches(self, example) {
                return Box::new(std::iter::once(Err(invalid_example(example, self, &f))));
            }
            let keys: Vec<String> = self
                .fields
                .iter()
                .filter(|(k, f)| !f.optional || row.has_key(k))
                .map(|(k, _)| k.clone())
                .collect();
            return match self.variants_for_keys(&keys, row, resolver) {
                Ok(nodes) => Box::new(nodes.into_iter().map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            };
        }

        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let combinations = resolver
            .strategy()
            .key_combinations(self.mandatory_keys(), self.optional_keys());
        Box::new(combinations.flat_map(move |keys| {
            let items: Vec<Result<Node, EngineError>> = match this.variants_for_keys(&keys, &row, &resolver) {
                Ok(nodes) => nodes.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            items
        }))
    }

    fn negative_variants(&self, row: &Row, resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let keys: Vec<String> = self.fields.keys().cloned().collect();

        let per_key = keys.into_iter().flat_map(move |key| {
            let Some(field) = this.fields.get(&key).cloned() else {
                return Vec::new();
            };
            let child_resolver = resolver.with_lookup_key(&key);
            let mut out: Vec<Result<Node, EngineError>> = resolver
                .strategy()
                .negative_variants(&field.node, &row.child(&key), &child_resolver)
                .map(|negative| negative.map(|node| this.with_field(&key, node)))
                .collect();
            if !field.optional {
                out.push(Ok(this.without_field(&key)));
            }
            out
        });

        let types: Vec<Node> = if config.data_type_negatives {
            data_type_negatives("object")
        } else {
            Vec::new()
        };
        Box::new(per_key.chain(types.into_iter().map(Ok)))
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let Some(object) = other.as_any().downcast_ref::<ObjectNode>() else {
            return kind_mismatch(self, other, mine);
        };

        let mut failures = Vec::new();
        for (key, field) in &self.fields {
            match object.fields.get(key) {
                Some(their) => {
                    if !field.optional && their.optional {
                        failures.push(
                            Failure::new(mine.messages().missing_key("key", key)).breadcrumb(key.as_str()),
                        );
                        continue;
                    }
                    let result = field.node.subsumes(
                        their.node.as_ref(),
                        &mine.with_lookup_key(key),
                        &theirs.with_lookup_key(key),
                    );
                    if let MatchResult::Failure(f) = result {
                        failures.push(f.breadcrumb(key.as_str()));
                    }
                }
                None if !field.optional => failures.push(
                    KeyError::MissingKey(key.clone()).to_failure("key", mine.messages()),
                ),
                None => {}
            }
        }

        for (key, their) in &object.fields {
            if self.fields.contains_key(key) {
                continue;
            }
            if let Some(additional) = &self.additional {
                if let MatchResult::Failure(f) = additional.subsumes(their.node.as_ref(), mine, theirs) {
                    failures.push(f.breadcrumb(key.as_str()));
                }
            } else if mine.key_policy().unexpected == crate::key_check::UnexpectedKeyCheck::Reject {
                failures.push(KeyError::UnexpectedKey(key.clone()).to_failure("key", mine.messages()));
            }
        }

        Failure::result_of(failures)
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(ContractError::Parse {
                text: text.to_string(),
                expected: self.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        "json object".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NumberNode, StringNode};
    use crate::strategy::Generative;
    use serde_json::json;

    fn person() -> ObjectNode {
        ObjectNode::new(BTreeMap::from([
            ("name".to_string(), Field::mandatory(Arc::new(StringNode::default()))),
            ("age".to_string(), Field::optional(Arc::new(NumberNode::default()))),
        ]))
    }

    #[test]
    fn reports_every_offending_key() {
        let r = Resolver::new();
        let result = person().matches(&json!({"age": "old", "extra": 1}), &r);
        let report = result.as_failure().unwrap().report();
        assert_eq!(report.paths(), vec!["name", "extra", "age"]);
    }

    #[test]
    fn extensible_policy_ignores_extra_keys() {
        let r = Resolver::new().with_key_policy(crate::key_check::KeyPolicy::extensible());
        assert!(person().matches(&json!({"name": "a", "extra": 1}), &r).is_success());
    }

    #[test]
    fn generates_every_declared_key() {
        let r = Resolver::new();
        let value = person().generate(&r).unwrap();
        assert!(value["name"].is_string());
        assert!(value["age"].is_number());
    }

    #[test]
    fn generative_variants_cover_optional_subsets() {
        let r = Resolver::new().with_strategy(Arc::new(Generative::new()));
        let variants: Vec<Node> = person()
            .variants_from_example(&Row::empty(), &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(variants.len(), 2);
        let with_age = variants[0].generate(&r).unwrap();
        let without_age = variants[1].generate(&r).unwrap();
        assert!(with_age.get("age").is_some());
        assert!(without_age.get("age").is_none());
    }

    #[test]
    fn example_decides_optional_keys() {
        let r = Resolver::new();
        let row = Row::empty().with_current(Some(json!({"name": "Jane"})));
        let variants: Vec<Node> = person()
            .variants_from_example(&row, &r)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].generate(&r).unwrap(), json!({"name": "Jane"}));
    }

    #[test]
    fn wider_object_subsumes_narrower() {
        let r = Resolver::new();
        let narrower = ObjectNode::new(BTreeMap::from([(
            "name".to_string(),
            Field::mandatory(Arc::new(StringNode::default())),
        )]));
        assert!(person().subsumes(&narrower, &r, &r).is_success());
        let result = narrower.subsumes(&person(), &r, &r);
        assert_eq!(result.as_failure().unwrap().report().paths(), vec!["age"]);
    }
}
