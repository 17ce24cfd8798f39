//! Scalar nodes: string, number, boolean, null, any value, enum

use std::any::Any;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Number, Value};

use super::{
    NegativeConfig, Node, NodeSeq, SchemaNode, empty_seq, exact, invalid_example, kind_mismatch,
    mismatch, once, parse_json_or_string, scalar_negatives, subsumes_by_other,
};
use crate::error::{ContractError, EngineError};
use crate::mismatch::describe_value;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;

const DEFAULT_STRING_LENGTH: usize = 8;

/// Example at the cursor as an exact node, or `node` itself when there is none.
pub(crate) fn anchored_or(node: Node, row: &Row, resolver: &Resolver) -> NodeSeq {
    match row.current() {
        None => once(node),
        Some(example) => {
            let item = match resolver.matches(node.as_ref(), example) {
                MatchResult::Success(_) => Ok(exact(example.clone())),
                MatchResult::Failure(failure) => Err(invalid_example(example, node.as_ref(), &failure)),
            };
            Box::new(std::iter::once(item))
        }
    }
}

// --- string ---------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringNode {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regular expression the whole value must match
    pub pattern: Option<String>,
}

impl StringNode {
    #[must_use]
    pub fn with_lengths(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        Self {
            min_length,
            max_length,
            pattern: None,
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    fn regex(&self) -> Option<Result<regex_lite::Regex, ContractError>> {
        self.pattern.as_ref().map(|p| {
            regex_lite::Regex::new(&format!("^(?:{p})$")).map_err(|e| ContractError::Parse {
                text: p.clone(),
                expected: format!("regular expression ({e})"),
            })
        })
    }

    /// Within `min_length..=max_length`; at least one char when unbounded below
    fn random_length(&self) -> usize {
        let min = self
            .min_length
            .unwrap_or_else(|| self.max_length.map_or(1, |max| max.min(1)));
        let max = self.max_length.unwrap_or(min.max(DEFAULT_STRING_LENGTH));
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max.min(min + DEFAULT_STRING_LENGTH))
    }
}

/// Lowercase letters only, so the text never reads as a number or boolean
fn random_letters(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

impl SchemaNode for StringNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::String(text) = value else {
            return mismatch("string", value, resolver);
        };
        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return mismatch(&format!("string with minLength {min}"), value, resolver);
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return mismatch(&format!("string with maxLength {max}"), value, resolver);
            }
        }
        match self.regex() {
            Some(Ok(regex)) if !regex.is_match(text) => mismatch(
                &format!("string matching /{}/", self.pattern.as_deref().unwrap_or_default()),
                value,
                resolver,
            ),
            Some(Err(e)) => MatchResult::failure(e.to_string()),
            _ => MatchResult::success(),
        }
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(ContractError::Ungeneratable(format!(
                    "string with minLength {min} and maxLength {max}"
                ))
                .into());
            }
        }
        let Some(regex) = self.regex() else {
            return Ok(Value::String(random_letters(self.random_length())));
        };
        let regex = regex?;
        for _ in 0..16 {
            let candidate = random_letters(self.random_length());
            if regex.is_match(&candidate) {
                return Ok(Value::String(candidate));
            }
        }
        Err(ContractError::Ungeneratable(format!(
            "string matching /{}/",
            self.pattern.as_deref().unwrap_or_default()
        ))
        .into())
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        anchored_or(Arc::new(self.clone()), row, resolver)
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let mut extra = Vec::new();
        if let Some(min) = self.min_length.filter(|m| *m > 0) {
            extra.push(exact(Value::String("a".repeat(min - 1))));
        }
        if let Some(max) = self.max_length {
            extra.push(exact(Value::String("a".repeat(max + 1))));
        }
        scalar_negatives("string", config, extra)
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let any = other.as_any();
        if let Some(enumeration) = any.downcast_ref::<EnumNode>() {
            return enumeration.all_values_match(self, mine);
        }
        let Some(theirs_string) = any.downcast_ref::<StringNode>() else {
            return kind_mismatch(self, other, mine);
        };
        let min_ok = self.min_length.unwrap_or(0) <= theirs_string.min_length.unwrap_or(0);
        let max_ok = match (self.max_length, theirs_string.max_length) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(m), Some(t)) => m >= t,
        };
        let pattern_ok = self.pattern.is_none() || self.pattern == theirs_string.pattern;
        if min_ok && max_ok && pattern_ok {
            MatchResult::success()
        } else {
            kind_mismatch(self, other, mine)
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        Ok(Value::String(text.to_string()))
    }

    fn type_name(&self) -> String {
        "string".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- number ---------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberNode {
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl NumberNode {
    #[must_use]
    pub fn integer() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    fn is_integral(number: &Number) -> bool {
        number.is_i64() || number.is_u64() || number.as_f64().is_some_and(|f| f.fract() == 0.0)
    }

    fn range(&self) -> (f64, f64) {
        let low = self.minimum.unwrap_or(match self.maximum {
            Some(max) if max < 1.0 => max - 1000.0,
            _ => 1.0,
        });
        let high = self.maximum.unwrap_or(low + 999.0);
        (low, high)
    }
}

impl SchemaNode for NumberNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Number(number) = value else {
            return mismatch(&self.type_name(), value, resolver);
        };
        if self.integer && !Self::is_integral(number) {
            return mismatch("integer", value, resolver);
        }
        let actual = number.as_f64().unwrap_or_default();
        if let Some(min) = self.minimum {
            if actual < min {
                return mismatch(&format!("number >= {min}"), value, resolver);
            }
        }
        if let Some(max) = self.maximum {
            if actual > max {
                return mismatch(&format!("number <= {max}"), value, resolver);
            }
        }
        MatchResult::success()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        let (low, high) = self.range();
        let (int_low, int_high) = (low.ceil() as i64, high.floor() as i64);
        let mut rng = rand::thread_rng();
        if int_low <= int_high {
            return Ok(Value::from(rng.gen_range(int_low..=int_high)));
        }
        if self.integer || low > high {
            return Err(ContractError::Ungeneratable(format!("number between {low} and {high}")).into());
        }
        let value = rng.gen_range(low..=high);
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| ContractError::Ungeneratable(format!("number {value}")).into())
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        anchored_or(Arc::new(self.clone()), row, resolver)
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let mut extra = Vec::new();
        if let Some(min) = self.minimum {
            extra.extend(Number::from_f64(min - 1.0).map(|n| exact(Value::Number(n))));
        }
        if let Some(max) = self.maximum {
            extra.extend(Number::from_f64(max + 1.0).map(|n| exact(Value::Number(n))));
        }
        if self.integer {
            let (low, _) = self.range();
            extra.extend(Number::from_f64(low.floor() + 0.5).map(|n| exact(Value::Number(n))));
        }
        scalar_negatives("number", config, extra)
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let any = other.as_any();
        if let Some(enumeration) = any.downcast_ref::<EnumNode>() {
            return enumeration.all_values_match(self, mine);
        }
        let Some(number) = any.downcast_ref::<NumberNode>() else {
            return kind_mismatch(self, other, mine);
        };
        let integer_ok = !self.integer || number.integer;
        let min_ok = match (self.minimum, number.minimum) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(m), Some(t)) => m <= t,
        };
        let max_ok = match (self.maximum, number.maximum) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(m), Some(t)) => m >= t,
        };
        if integer_ok && min_ok && max_ok {
            MatchResult::success()
        } else {
            kind_mismatch(self, other, mine)
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Value::from(i));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ContractError::Parse {
                text: text.to_string(),
                expected: self.type_name(),
            })
    }

    fn type_name(&self) -> String {
        if self.integer { "integer" } else { "number" }.to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- boolean --------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BooleanNode;

impl SchemaNode for BooleanNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if value.is_boolean() {
            MatchResult::success()
        } else {
            mismatch("boolean", value, resolver)
        }
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        Ok(Value::Bool(rand::thread_rng().gen_bool(0.5)))
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        anchored_or(Arc::new(*self), row, resolver)
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        scalar_negatives("boolean", config, Vec::new())
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        let any = other.as_any();
        if let Some(enumeration) = any.downcast_ref::<EnumNode>() {
            return enumeration.all_values_match(self, mine);
        }
        if any.is::<BooleanNode>() {
            MatchResult::success()
        } else {
            kind_mismatch(self, other, mine)
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        match text.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ContractError::Parse {
                text: text.to_string(),
                expected: "boolean".into(),
            }),
        }
    }

    fn type_name(&self) -> String {
        "boolean".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- null -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullNode;

impl SchemaNode for NullNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if value.is_null() {
            MatchResult::success()
        } else {
            mismatch("null", value, resolver)
        }
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        Ok(Value::Null)
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        anchored_or(Arc::new(*self), row, resolver)
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        scalar_negatives("null", config, Vec::new())
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        if other.as_any().is::<NullNode>() {
            MatchResult::success()
        } else {
            kind_mismatch(self, other, mine)
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        match text.trim() {
            "" | "null" => Ok(Value::Null),
            _ => Err(ContractError::Parse {
                text: text.to_string(),
                expected: "null".into(),
            }),
        }
    }

    fn type_name(&self) -> String {
        "null".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- any value ------------------------------------------------------------

/// Accepts every value; generates a short string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnyValueNode;

impl SchemaNode for AnyValueNode {
    fn matches(&self, _value: &Value, _resolver: &Resolver) -> MatchResult {
        MatchResult::success()
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        Ok(Value::String(random_letters(DEFAULT_STRING_LENGTH)))
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        anchored_or(Arc::new(*self), row, resolver)
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, _config: &NegativeConfig) -> NodeSeq {
        empty_seq()
    }

    fn subsumes(&self, _other: &dyn SchemaNode, _mine: &Resolver, _theirs: &Resolver) -> MatchResult {
        MatchResult::success()
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        Ok(parse_json_or_string(text))
    }

    fn type_name(&self) -> String {
        "anyvalue".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// --- enum -----------------------------------------------------------------

/// One of a fixed set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub values: Vec<Value>,
}

impl EnumNode {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| super::exact::values_equal(v, value))
    }

    fn base_type(&self) -> &'static str {
        match self.values.first() {
            Some(Value::Number(_)) => "number",
            Some(Value::Bool(_)) => "boolean",
            Some(Value::Null) => "null",
            _ => "string",
        }
    }

    /// Every value of this enum is accepted by `node`
    pub(crate) fn all_values_match(&self, node: &dyn SchemaNode, resolver: &Resolver) -> MatchResult {
        let failures = self
            .values
            .iter()
            .filter_map(|v| resolver.matches(node, v).into_failure())
            .collect();
        crate::result::Failure::result_of(failures)
    }
}

impl SchemaNode for EnumNode {
    fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if self.contains(value) {
            MatchResult::success()
        } else {
            mismatch(&self.type_name(), value, resolver)
        }
    }

    fn generate(&self, _resolver: &Resolver) -> Result<Value, EngineError> {
        self.values
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ContractError::Ungeneratable("empty enum".into()).into())
    }

    fn variants_from_example(&self, row: &Row, resolver: &Resolver) -> NodeSeq {
        if row.current().is_some() || !resolver.is_generative() {
            return anchored_or(Arc::new(self.clone()), row, resolver);
        }
        Box::new(self.values.clone().into_iter().map(|v| Ok(exact(v))))
    }

    fn negative_variants(&self, _row: &Row, _resolver: &Resolver, config: &NegativeConfig) -> NodeSeq {
        let extra = if self.base_type() == "string" {
            vec![exact(Value::String("not-in-enum".into()))]
        } else {
            Vec::new()
        };
        scalar_negatives(self.base_type(), config, extra)
    }

    fn subsumes(&self, other: &dyn SchemaNode, mine: &Resolver, theirs: &Resolver) -> MatchResult {
        if let Some(result) = subsumes_by_other(self, other, mine, theirs) {
            return result;
        }
        match other.as_any().downcast_ref::<EnumNode>() {
            Some(enumeration) => enumeration.all_values_match(self, mine),
            None => kind_mismatch(self, other, mine),
        }
    }

    fn parse(&self, text: &str, _resolver: &Resolver) -> Result<Value, ContractError> {
        let value = if self.base_type() == "string" {
            Value::String(text.to_string())
        } else {
            parse_json_or_string(text)
        };
        if self.contains(&value) {
            Ok(value)
        } else {
            Err(ContractError::Parse {
                text: text.to_string(),
                expected: self.type_name(),
            })
        }
    }

    fn type_name(&self) -> String {
        let values: Vec<String> = self.values.iter().map(describe_value).collect();
        format!("one of [{}]", values.join(", "))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn r() -> Resolver {
        Resolver::new()
    }

    #[test]
    fn string_constraints() {
        let node = StringNode::with_lengths(Some(2), Some(4));
        assert!(node.matches(&json!("abc"), &r()).is_success());
        assert!(!node.matches(&json!("a"), &r()).is_success());
        assert!(!node.matches(&json!("abcde"), &r()).is_success());
        assert!(!node.matches(&json!(3), &r()).is_success());
    }

    #[test]
    fn generated_strings_respect_max_length() {
        let empty_only = StringNode::with_lengths(None, Some(0));
        assert_eq!(empty_only.generate(&r()).unwrap(), json!(""));
        let short = StringNode::with_lengths(None, Some(2));
        for _ in 0..20 {
            let value = short.generate(&r()).unwrap();
            assert!(short.matches(&value, &r()).is_success(), "{value}");
        }
    }

    #[test]
    fn string_pattern_matches_whole_value() {
        let node = StringNode::default().with_pattern("[a-z]+");
        assert!(node.matches(&json!("abc"), &r()).is_success());
        assert!(!node.matches(&json!("abc1"), &r()).is_success());
        let generated = node.generate(&r()).unwrap();
        assert!(node.matches(&generated, &r()).is_success());
    }

    #[test]
    fn number_bounds_and_integer() {
        let node = NumberNode::integer().with_bounds(Some(1.0), Some(10.0));
        assert!(node.matches(&json!(5), &r()).is_success());
        assert!(!node.matches(&json!(0), &r()).is_success());
        assert!(!node.matches(&json!(2.5), &r()).is_success());
        for _ in 0..20 {
            assert!(node.matches(&node.generate(&r()).unwrap(), &r()).is_success());
        }
    }

    #[test]
    fn empty_integer_range_is_ungeneratable() {
        let node = NumberNode::integer().with_bounds(Some(1.2), Some(1.8));
        assert!(matches!(
            node.generate(&r()),
            Err(EngineError::Contract(ContractError::Ungeneratable(_)))
        ));
    }

    #[test]
    fn number_parse() {
        assert_eq!(NumberNode::default().parse("10", &r()).unwrap(), json!(10));
        assert_eq!(NumberNode::default().parse("1.5", &r()).unwrap(), json!(1.5));
        assert!(NumberNode::default().parse("ten", &r()).is_err());
    }

    #[test]
    fn example_becomes_exact_variant() {
        let row = Row::empty().with_current(Some(json!(42)));
        let variants: Vec<Node> = NumberNode::default()
            .variants_from_example(&row, &r())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(variants.len(), 1);
        assert!(variants[0].matches(&json!(42), &r()).is_success());
        assert!(!variants[0].matches(&json!(43), &r()).is_success());
    }

    #[test]
    fn invalid_example_is_an_error() {
        let row = Row::empty().with_current(Some(json!("x")));
        let first = NumberNode::default().variants_from_example(&row, &r()).next().unwrap();
        assert!(matches!(
            first,
            Err(EngineError::Contract(ContractError::InvalidExample { .. }))
        ));
    }

    #[test]
    fn enum_membership_and_subsumption() {
        let node = EnumNode::new(vec![json!("a"), json!("b")]);
        assert!(node.matches(&json!("a"), &r()).is_success());
        assert!(!node.matches(&json!("c"), &r()).is_success());
        assert!(StringNode::default().subsumes(&node, &r(), &r()).is_success());
        assert!(!node.subsumes(&StringNode::default(), &r(), &r()).is_success());
    }

    #[test]
    fn narrower_string_is_subsumed() {
        let wide = StringNode::default();
        let narrow = StringNode::with_lengths(Some(1), Some(3));
        assert!(wide.subsumes(&narrow, &r(), &r()).is_success());
        assert!(!narrow.subsumes(&wide, &r(), &r()).is_success());
    }
}
