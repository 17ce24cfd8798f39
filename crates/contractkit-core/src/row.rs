//! Example rows
//!
//! A row is one named example of an operation: parameter values keyed by
//! name plus an optional request body. While generating variants the row
//! carries a cursor (`current`) pointing at the example value for the schema
//! position being expanded.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

/// Column holding the JSON request body of an example
pub const REQUEST_BODY_COLUMN: &str = "(REQUEST-BODY)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub name: String,
    columns: Arc<BTreeMap<String, String>>,
    current: Option<Value>,
}

impl Row {
    #[must_use]
    pub fn new(name: impl Into<String>, columns: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            columns: Arc::new(columns),
            current: None,
        }
    }

    /// The row used when a scenario has no examples
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.current.is_none()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn columns(&self) -> &BTreeMap<String, String> {
        &self.columns
    }

    /// Example value at the current position
    #[must_use]
    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn with_current(&self, value: Option<Value>) -> Self {
        Self {
            name: self.name.clone(),
            columns: Arc::clone(&self.columns),
            current: value,
        }
    }

    /// Cursor on the request body column, parsed as JSON (or kept as text)
    #[must_use]
    pub fn for_body(&self) -> Self {
        let body = self.column(REQUEST_BODY_COLUMN).map(|text| {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        });
        self.with_current(body)
    }

    /// Cursor on `key` of the current object
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let value = match &self.current {
            Some(Value::Object(map)) => map.get(key).cloned(),
            _ => None,
        };
        self.with_current(value)
    }

    /// Cursor on element `index` of the current array
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let value = match &self.current {
            Some(Value::Array(items)) => items.get(index).cloned(),
            _ => None,
        };
        self.with_current(value)
    }

    /// Whether the current object example mentions `key`
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        matches!(&self.current, Some(Value::Object(map)) if map.contains_key(key))
    }
}

/// The example rows of one scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Examples {
    pub rows: Vec<Row>,
}

impl Examples {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows to generate from: the declared rows, or one empty row
    #[must_use]
    pub fn rows_or_empty(&self) -> Vec<Row> {
        if self.rows.is_empty() {
            vec![Row::empty()]
        } else {
            self.rows.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row_with_body(body: &Value) -> Row {
        Row::new(
            "example",
            BTreeMap::from([(REQUEST_BODY_COLUMN.to_string(), body.to_string())]),
        )
    }

    #[test]
    fn descends_into_body() {
        let row = row_with_body(&json!({"items": [{"sku": "A"}]})).for_body();
        assert!(row.has_key("items"));
        let sku = row.child("items").index(0).child("sku");
        assert_eq!(sku.current(), Some(&json!("A")));
        assert_eq!(row.child("missing").current(), None);
    }

    #[test]
    fn non_json_body_kept_as_text() {
        let row = Row::new(
            "plain",
            BTreeMap::from([(REQUEST_BODY_COLUMN.to_string(), "hello".to_string())]),
        )
        .for_body();
        assert_eq!(row.current(), Some(&json!("hello")));
    }

    #[test]
    fn no_examples_means_one_empty_row() {
        let rows = Examples::default().rows_or_empty();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
    }
}
