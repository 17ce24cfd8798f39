//! Wording of mismatch messages
//!
//! The same engine validates live responses against a contract and stubs
//! against a contract; only the words differ.

use std::fmt;

use serde_json::Value;

/// Pluggable wording for "expected X got Y", "unexpected key" and "missing key".
pub trait MismatchMessages: fmt::Debug + Send + Sync {
    fn mismatch(&self, expected: &str, actual: &str) -> String;

    /// `kind` is e.g. "key", "header", "query param"
    fn unexpected_key(&self, kind: &str, name: &str) -> String;

    fn missing_key(&self, kind: &str, name: &str) -> String;
}

/// Neutral wording used when no side is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMismatchMessages;

impl MismatchMessages for DefaultMismatchMessages {
    fn mismatch(&self, expected: &str, actual: &str) -> String {
        format!("Expected {expected}, actual was {actual}")
    }

    fn unexpected_key(&self, kind: &str, name: &str) -> String {
        format!("{} named \"{name}\" was unexpected", capitalize(kind))
    }

    fn missing_key(&self, kind: &str, name: &str) -> String {
        format!("Expected {kind} named \"{name}\" was missing")
    }
}

/// Contract vs. live traffic (contract tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractMismatchMessages;

impl MismatchMessages for ContractMismatchMessages {
    fn mismatch(&self, expected: &str, actual: &str) -> String {
        format!("Specification expected {expected} but response contained {actual}")
    }

    fn unexpected_key(&self, kind: &str, name: &str) -> String {
        format!("{} named \"{name}\" in the response was not in the specification", capitalize(kind))
    }

    fn missing_key(&self, kind: &str, name: &str) -> String {
        format!("Specification expected mandatory {kind} named \"{name}\" but it was missing")
    }
}

/// Contract vs. a hand-written stub.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubMismatchMessages;

impl MismatchMessages for StubMismatchMessages {
    fn mismatch(&self, expected: &str, actual: &str) -> String {
        format!("Specification expected {expected} but stub contained {actual}")
    }

    fn unexpected_key(&self, kind: &str, name: &str) -> String {
        format!("{} named \"{name}\" in the stub was not in the specification", capitalize(kind))
    }

    fn missing_key(&self, kind: &str, name: &str) -> String {
        format!("Specification expected mandatory {kind} named \"{name}\" but it was missing from the stub")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Short description of a value for messages: `"abc" (string)`, `10 (number)`.
#[must_use]
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("{b} (boolean)"),
        Value::Number(n) => format!("{n} (number)"),
        Value::String(s) => format!("\"{s}\" (string)"),
        Value::Array(_) => "JSON array".to_string(),
        Value::Object(_) => "JSON object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_wording() {
        let m = DefaultMismatchMessages;
        assert_eq!(m.mismatch("number", "\"x\" (string)"), "Expected number, actual was \"x\" (string)");
        assert_eq!(m.unexpected_key("header", "X-Id"), "Header named \"X-Id\" was unexpected");
        assert_eq!(m.missing_key("key", "name"), "Expected key named \"name\" was missing");
    }

    #[test]
    fn stub_wording_mentions_stub() {
        let m = StubMismatchMessages;
        assert!(m.mismatch("number", "null").contains("stub contained null"));
        assert!(m.missing_key("key", "id").ends_with("missing from the stub"));
    }

    #[test]
    fn describes_values() {
        assert_eq!(describe_value(&json!("a")), "\"a\" (string)");
        assert_eq!(describe_value(&json!(10)), "10 (number)");
        assert_eq!(describe_value(&json!(null)), "null");
        assert_eq!(describe_value(&json!({"a": 1})), "JSON object");
    }
}
