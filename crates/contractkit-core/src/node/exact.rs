use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use super::{
    EnumNode, NegativeConfig, NodeSeq, NullNode, SchemaNode, kind_mismatch, mismatch, once,
    scalar_negatives, subsumes_by_other, value_to_text,
};
use crate::error::{ContractError, EngineError};
use crate::mismatch::describe_value;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;

/// Accepts one literal value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactValue {
    value: Value,
}

impl ExactValue {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// JSON equality that treats `10` and `10.0` as the same number
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "structure",
    }
}

impl SchemaNode for ExactValue {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if values_equal(&self.value, value) {
            MatchResult::success()
        } else {
            mismatch(&self.type_name(), value, resolver)
        }
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        Ok(self.value.clone())
    }

    fn variants_from_example(&self, _row: &Row, _resolver: &Resolver) -> NodeSeq {
        once(Arc::new(self.clone()))
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        scalar_negatives(json_type(&self.value), config, Vec::new())
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let any = other.as_any();
        if self.value.is_null() && any.is::<NullNode>() {
            return MatchResult::success();
        }
        if let Some(enumeration) = any.downcast_ref::<EnumNode>() {
            return enumeration.all_values_match(self, mine);
        }
        kind_mismatch(self, other, mine)
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        if value_to_text(&self.value) == text {
            Ok(self.value.clone())
        } else {
            Err(ContractError::Parse {
                text: text.to_string(),
                expected: self.type_name(),
            })
        }
    }

    fn type_name(&self) -> String {
        describe_value(&self.value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NumberNode;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(10), &json!(10.0)));
        assert!(values_equal(&json!({"a": [1]}), &json!({"a": [1.0]})));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn literal_subsumed_by_its_type() {
        let r = Resolver::new();
        let literal = ExactValue::new(json!(10));
        assert!(NumberNode::default().subsumes(&literal, &r, &r).is_success());
        assert!(!literal.subsumes(&NumberNode::default(), &r, &r).is_success());
        assert!(literal.subsumes(&ExactValue::new(json!(10)), &r, &r).is_success());
    }

    #[test]
    fn parses_its_own_text() {
        let r = Resolver::new();
        let literal = ExactValue::new(json!("users"));
        assert_eq!(literal.parse("users", &r).unwrap(), json!("users"));
        assert!(literal.parse("orders", &r).is_err());
    }
}
