//! Path-keyed values injected into generated payloads
//!
//! Keys are body-relative lookup paths: `name`, `address.city`,
//! `items[0].sku`. Array indices may be written as `[*]` to cover every
//! element. A key of the form `(type)` supplies a default for every
//! generated value of that type.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::ContractError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: BTreeMap<String, Value>,
}

impl Dictionary {
    #[must_use]
    pub fn new(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }

    /// Parse a dictionary from a JSON object of `path -> value`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidDictionary`] when the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, ContractError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ContractError::InvalidDictionary(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self {
                entries: map.into_iter().collect(),
            }),
            other => Err(ContractError::InvalidDictionary(format!(
                "expected a JSON object, found {}",
                crate::mismatch::describe_value(&other)
            ))),
        }
    }

    /// Load a dictionary file.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidDictionary`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ContractError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContractError::InvalidDictionary(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Value for `path`: exact key first, then the `[*]` form, then the
    /// `(type_name)` default.
    #[must_use]
    pub fn lookup(&self, path: &str, type_name: &str) -> Option<&Value> {
        if self.entries.is_empty() {
            return None;
        }
        if !path.is_empty() {
            if let Some(value) = self.entries.get(path) {
                return Some(value);
            }
            let wildcard = wildcard_form(path);
            if wildcard != path {
                if let Some(value) = self.entries.get(&wildcard) {
                    return Some(value);
                }
            }
        }
        self.entries.get(&format!("({type_name})"))
    }
}

/// Replace every `[digits]` segment with `[*]`
fn wildcard_form(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if !after[..close].is_empty() && after[..close].bytes().all(|b| b.is_ascii_digit()) => {
                out.push_str("[*]");
                rest = &after[close + 1..];
            }
            _ => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn dictionary(value: Value) -> Dictionary {
        Dictionary::from_json(&value.to_string()).unwrap()
    }

    #[test]
    fn exact_path_wins() {
        let d = dictionary(json!({"name": "Jane", "(string)": "fallback"}));
        assert_eq!(d.lookup("name", "string"), Some(&json!("Jane")));
    }

    #[test]
    fn wildcard_covers_every_index() {
        let d = dictionary(json!({"items[*].sku": "ABC-1"}));
        assert_eq!(d.lookup("items[0].sku", "string"), Some(&json!("ABC-1")));
        assert_eq!(d.lookup("items[7].sku", "string"), Some(&json!("ABC-1")));
        assert_eq!(d.lookup("items[0].name", "string"), None);
    }

    #[test]
    fn type_default_applies_last() {
        let d = dictionary(json!({"(number)": 42}));
        assert_eq!(d.lookup("age", "number"), Some(&json!(42)));
        assert_eq!(d.lookup("age", "string"), None);
    }

    #[test]
    fn wildcard_form_keeps_non_numeric_brackets() {
        assert_eq!(wildcard_form("a[12].b[x]"), "a[*].b[x]");
        assert_eq!(wildcard_form("[3]"), "[*]");
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(
            Dictionary::from_json("[1,2]"),
            Err(ContractError::InvalidDictionary(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"id": 7}}"#).unwrap();
        let d = Dictionary::load(file.path()).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.lookup("id", "number"), Some(&json!(7)));
    }
}
