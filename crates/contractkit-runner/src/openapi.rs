//! OpenAPI parsing: paths, parameters, bodies and responses into a [`Feature`]
//!
//! Component schemas become named patterns and every `$ref` to one becomes a
//! [`ReferenceNode`], so self-referential schemas stay finite. Named examples
//! on parameters and request bodies are grouped by name into example rows.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use contractkit_core::facet::{ApiKeyLocation, FacetKind, KeyedPattern, ParamSpec, PathPattern, SecurityScheme};
use contractkit_core::node::{
    AnyOfNode, AnyValueNode, BooleanNode, EnumNode, ExactValue, Field, ListNode, NullNode, NumberNode, ObjectNode,
    ReferenceNode, StringNode, value_to_text,
};
use contractkit_core::request::MultipartPattern;
use contractkit_core::row::REQUEST_BODY_COLUMN;
use contractkit_core::{
    Dictionary, Examples, Feature, HttpRequestPattern, HttpResponsePattern, MatchSettings, Node, ResponseStatus, Row,
    Scenario,
};

use crate::RunnerError;

const METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];
const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const MAX_REF_HOPS: usize = 16;
/// Headers OpenAPI says to ignore when declared as parameters
const IMPLICIT_HEADERS: [&str; 3] = ["accept", "content-type", "authorization"];

/// Parse an OpenAPI document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`), then fall back to
/// content sniffing (leading `{` → JSON, otherwise YAML).
///
/// # Errors
///
/// [`RunnerError::Parse`] for malformed documents.
pub fn parse_spec(path: &Path, content: &str) -> Result<Value, RunnerError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let json = match ext.as_str() {
        "yaml" | "yml" => false,
        "json" => true,
        _ => content.trim_start().starts_with('{'),
    };
    if json {
        serde_json::from_str(content).map_err(|e| RunnerError::Parse(format!("Invalid JSON: {e}")))
    } else {
        serde_yml::from_str(content).map_err(|e| RunnerError::Parse(format!("Invalid YAML: {e}")))
    }
}

/// Builds a [`Feature`] from an OpenAPI document.
#[derive(Debug, Clone, Default)]
pub struct OpenApiLoader {
    settings: MatchSettings,
    dictionary: Arc<Dictionary>,
}

impl OpenApiLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// # Errors
    ///
    /// [`RunnerError::Io`] if the file cannot be read, otherwise as
    /// [`from_value`](Self::from_value).
    pub fn load(&self, path: &Path) -> Result<Feature, RunnerError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunnerError::Io(format!("{}: {e}", path.display())))?;
        let spec = parse_spec(path, &content)?;
        self.from_value(&spec)
    }

    /// # Errors
    ///
    /// [`RunnerError::Parse`] for unsupported references,
    /// [`RunnerError::Contract`] for invalid path templates.
    pub fn from_value(&self, spec: &Value) -> Result<Feature, RunnerError> {
        let document = Document::new(spec)?;
        let name = spec
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut scenarios = Vec::new();
        if let Some(paths) = spec.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                let item = document.deref(item);
                for method in METHODS {
                    if let Some(operation) = item.get(method) {
                        scenarios.extend(document.operation(path, method, item, operation, self)?);
                    }
                }
            }
        }
        tracing::debug!(feature = %name, scenarios = scenarios.len(), "loaded OpenAPI document");
        Ok(Feature::new(name, scenarios))
    }
}

struct Document<'v> {
    root: &'v Value,
    patterns: Arc<BTreeMap<String, Node>>,
}

/// Parameter or body example values, by example name then column
type ExampleColumns = BTreeMap<String, BTreeMap<String, String>>;

struct RequestParts {
    pattern: HttpRequestPattern,
    examples: ExampleColumns,
}

impl<'v> Document<'v> {
    fn new(root: &'v Value) -> Result<Self, RunnerError> {
        let mut document = Self {
            root,
            patterns: Arc::default(),
        };
        let mut patterns = BTreeMap::new();
        if let Some(schemas) = root.pointer("/components/schemas").and_then(Value::as_object) {
            for (name, schema) in schemas {
                patterns.insert(name.clone(), document.schema_node(schema)?);
            }
        }
        document.patterns = Arc::new(patterns);
        Ok(document)
    }

    /// Follow local `$ref`s to the referenced object
    fn deref<'a>(&'a self, mut value: &'a Value) -> &'a Value {
        for _ in 0..MAX_REF_HOPS {
            let Some(target) = value
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix('#'))
                .and_then(|pointer| self.root.pointer(pointer))
            else {
                return value;
            };
            value = target;
        }
        value
    }

    // --- schemas --------------------------------------------------------

    fn schema_node(&self, schema: &Value) -> Result<Node, RunnerError> {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let name = reference
                .strip_prefix(SCHEMA_REF_PREFIX)
                .ok_or_else(|| RunnerError::Parse(format!("Unsupported schema reference {reference}")))?;
            return Ok(Arc::new(ReferenceNode::new(name)));
        }
        let node = self.plain_schema_node(schema)?;
        let nullable = schema.get("nullable").and_then(Value::as_bool).unwrap_or(false)
            || type_names(schema).contains(&"null") && primary_type(schema).is_some();
        Ok(if nullable {
            Arc::new(AnyOfNode::nullable(node))
        } else {
            node
        })
    }

    fn plain_schema_node(&self, schema: &Value) -> Result<Node, RunnerError> {
        if let Some(values) = schema.get("enum").and_then(Value::as_array) {
            let values = values.iter().filter(|v| !v.is_null()).cloned().collect();
            return Ok(Arc::new(EnumNode::new(values)));
        }
        if let Some(value) = schema.get("const") {
            return Ok(Arc::new(ExactValue::new(value.clone())));
        }
        for key in ["oneOf", "anyOf"] {
            if let Some(branches) = schema.get(key).and_then(Value::as_array) {
                let branches = branches
                    .iter()
                    .map(|b| self.schema_node(b))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Arc::new(AnyOfNode::new(branches)));
            }
        }
        if let Some(parts) = schema.get("allOf").and_then(Value::as_array) {
            if let [single] = parts.as_slice() {
                return self.schema_node(single);
            }
            return self.object_node(&self.merge_all_of(parts, 0));
        }

        let node: Node = match primary_type(schema) {
            Some("string") => {
                let mut node = StringNode::with_lengths(usize_field(schema, "minLength"), usize_field(schema, "maxLength"));
                if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
                    node = node.with_pattern(pattern);
                }
                Arc::new(node)
            }
            Some("integer") => Arc::new(NumberNode::integer().with_bounds(f64_field(schema, "minimum"), f64_field(schema, "maximum"))),
            Some("number") => Arc::new(NumberNode::default().with_bounds(f64_field(schema, "minimum"), f64_field(schema, "maximum"))),
            Some("boolean") => Arc::new(BooleanNode),
            Some("null") => Arc::new(NullNode),
            Some("array") => {
                let item = match schema.get("items") {
                    Some(items) => self.schema_node(items)?,
                    None => Arc::new(AnyValueNode),
                };
                Arc::new(ListNode::new(item))
            }
            Some("object") => self.object_node(schema)?,
            None if schema.get("properties").is_some() || schema.get("additionalProperties").is_some() => {
                self.object_node(schema)?
            }
            _ => Arc::new(AnyValueNode),
        };
        Ok(node)
    }

    fn object_node(&self, schema: &Value) -> Result<Node, RunnerError> {
        let required = required_names(schema);
        let mut fields = BTreeMap::new();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                let node = self.schema_node(property)?;
                let field = if required.contains(&name.as_str()) {
                    Field::mandatory(node)
                } else {
                    Field::optional(node)
                };
                fields.insert(name.clone(), field);
            }
        }
        let mut object = ObjectNode::new(fields);
        match schema.get("additionalProperties") {
            Some(Value::Bool(true)) => object = object.with_additional(Arc::new(AnyValueNode)),
            Some(extra @ Value::Object(_)) => object = object.with_additional(self.schema_node(extra)?),
            _ => {}
        }
        Ok(Arc::new(object))
    }

    /// `allOf` parts flattened into one object schema
    fn merge_all_of(&self, parts: &[Value], depth: usize) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();
        for part in parts {
            let part = self.deref(part);
            let flattened;
            let part = match part.get("allOf").and_then(Value::as_array) {
                Some(nested) if depth < MAX_REF_HOPS => {
                    flattened = self.merge_all_of(nested, depth + 1);
                    &flattened
                }
                _ => part,
            };
            if let Some(more) = part.get("properties").and_then(Value::as_object) {
                properties.extend(more.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Some(more) = part.get("required").and_then(Value::as_array) {
                required.extend(more.iter().cloned());
            }
        }
        serde_json::json!({"type": "object", "properties": properties, "required": required})
    }

    // --- operations -----------------------------------------------------

    fn operation(
        &self,
        path: &str,
        method: &str,
        item: &Value,
        operation: &Value,
        loader: &OpenApiLoader,
    ) -> Result<Vec<Scenario>, RunnerError> {
        let name = operation
            .get("summary")
            .or_else(|| operation.get("operationId"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let RequestParts { pattern, examples } = self.request(path, method, item, operation)?;

        let mut responses = Vec::new();
        if let Some(declared) = operation.get("responses").and_then(Value::as_object) {
            for (status, response) in declared {
                let Some(status) = parse_status(status) else {
                    tracing::warn!(%path, %method, %status, "skipping response with unsupported status");
                    continue;
                };
                let response = self.deref(response);
                responses.push((status, self.response(status, response)?, example_names(response)));
            }
        }

        let mut rows: Vec<Vec<Row>> = vec![Vec::new(); responses.len()];
        for (example, columns) in examples {
            let target = responses
                .iter()
                .position(|(_, _, names)| names.contains(&example))
                .or_else(|| responses.iter().position(|(status, _, _)| status.is_success()));
            match target {
                Some(index) => rows[index].push(Row::new(example, columns)),
                None => tracing::warn!(%path, %method, %example, "example has no response to go with"),
            }
        }

        Ok(responses
            .into_iter()
            .zip(rows)
            .map(|((_, response, _), rows)| {
                Scenario::new(name.clone(), pattern.clone(), response)
                    .with_examples(Examples::new(rows))
                    .with_patterns(Arc::clone(&self.patterns))
                    .with_dictionary(Arc::clone(&loader.dictionary))
                    .with_settings(loader.settings)
            })
            .collect())
    }

    fn parameters<'a>(&'a self, item: &'a Value, operation: &'a Value) -> Vec<&'a Value> {
        let mut merged: Vec<&Value> = Vec::new();
        for source in [item.get("parameters"), operation.get("parameters")].into_iter().flatten() {
            for param in source.as_array().into_iter().flatten() {
                let param = self.deref(param);
                let key = |p: &Value| (p.get("name").cloned(), p.get("in").cloned());
                merged.retain(|existing| key(existing) != key(param));
                merged.push(param);
            }
        }
        merged
    }

    fn request(&self, path: &str, method: &str, item: &Value, operation: &Value) -> Result<RequestParts, RunnerError> {
        let mut examples = ExampleColumns::new();
        let mut path_params = BTreeMap::new();
        let mut query = BTreeMap::new();
        let mut headers = BTreeMap::new();

        for param in self.parameters(item, operation) {
            let (Some(name), Some(location)) = (
                param.get("name").and_then(Value::as_str),
                param.get("in").and_then(Value::as_str),
            ) else {
                continue;
            };
            let node = match param.get("schema") {
                Some(schema) => self.schema_node(schema)?,
                None => Arc::new(StringNode::default()),
            };
            let required = location == "path" || param.get("required").and_then(Value::as_bool).unwrap_or(false);
            let spec = if required {
                ParamSpec::mandatory(node.clone())
            } else {
                ParamSpec::optional(node.clone())
            };
            match location {
                "path" => {
                    path_params.insert(name.to_string(), node);
                }
                "query" => {
                    query.insert(name.to_string(), spec);
                }
                "header" if !IMPLICIT_HEADERS.contains(&name.to_ascii_lowercase().as_str()) => {
                    headers.insert(name.to_string(), spec);
                }
                _ => continue,
            }
            for (example, value) in named_examples(param, self) {
                examples
                    .entry(example)
                    .or_default()
                    .insert(name.to_string(), value_to_text(&value));
            }
        }

        let mut pattern = HttpRequestPattern::new(method, PathPattern::from_template(path, &path_params)?)
            .with_query(KeyedPattern::new(FacetKind::Query, query))
            .with_headers(KeyedPattern::new(FacetKind::Header, headers))
            .with_security(self.security(operation));

        if let Some(body) = operation.get("requestBody").map(|b| self.deref(b)) {
            if let Some((content_type, media)) = pick_media(body) {
                pattern = self.request_body(pattern, content_type, media)?.with_content_type(content_type);
                for (example, value) in named_examples(media, self) {
                    let text = match &value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    examples.entry(example).or_default().insert(REQUEST_BODY_COLUMN.to_string(), text);
                }
            }
        }

        Ok(RequestParts { pattern, examples })
    }

    fn request_body(&self, pattern: HttpRequestPattern, content_type: &str, media: &Value) -> Result<HttpRequestPattern, RunnerError> {
        let schema = media.get("schema").map(|s| self.deref(s));
        match content_type {
            "application/x-www-form-urlencoded" => {
                let Some(schema) = schema else {
                    return Ok(pattern);
                };
                let required = required_names(schema);
                let mut fields = BTreeMap::new();
                for (name, property) in properties(schema) {
                    let node = self.schema_node(property)?;
                    let spec = if required.contains(&name.as_str()) {
                        ParamSpec::mandatory(node)
                    } else {
                        ParamSpec::optional(node)
                    };
                    fields.insert(name.clone(), spec);
                }
                Ok(pattern.with_form_fields(KeyedPattern::new(FacetKind::FormField, fields)))
            }
            "multipart/form-data" => {
                let Some(schema) = schema else {
                    return Ok(pattern);
                };
                let required = required_names(schema);
                let mut pattern = pattern;
                for (name, property) in properties(schema) {
                    let mut part = MultipartPattern::new(name.clone(), self.schema_node(property)?);
                    if !required.contains(&name.as_str()) {
                        part = part.optional();
                    }
                    if let Some(part_type) = media
                        .pointer(&format!("/encoding/{name}/contentType"))
                        .and_then(Value::as_str)
                    {
                        part = part.with_content_type(part_type);
                    }
                    pattern = pattern.with_part(part);
                }
                Ok(pattern)
            }
            _ => {
                let node = match schema {
                    Some(schema) => self.schema_node(schema)?,
                    None => Arc::new(AnyValueNode),
                };
                Ok(pattern.with_body(node))
            }
        }
    }

    fn security(&self, operation: &Value) -> Vec<SecurityScheme> {
        let Some(requirements) = operation
            .get("security")
            .or_else(|| self.root.get("security"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };
        let mut schemes = Vec::new();
        for requirement in requirements {
            let Some(names) = requirement.as_object() else {
                continue;
            };
            // an empty requirement makes authentication optional
            if names.is_empty() {
                return Vec::new();
            }
            let mut all: Vec<SecurityScheme> = names.keys().filter_map(|n| self.security_scheme(n)).collect();
            match all.len() {
                0 => {}
                1 => schemes.extend(all.pop()),
                _ => schemes.push(SecurityScheme::All(all)),
            }
        }
        schemes
    }

    fn security_scheme(&self, name: &str) -> Option<SecurityScheme> {
        let scheme = self
            .root
            .pointer("/components/securitySchemes")
            .and_then(|schemes| schemes.get(name))
            .map(|s| self.deref(s))?;
        let scheme_type = scheme.get("type").and_then(Value::as_str)?;
        let resolved = match scheme_type {
            "http" => match scheme.get("scheme").and_then(Value::as_str)?.to_ascii_lowercase().as_str() {
                "bearer" => SecurityScheme::Bearer,
                "basic" => SecurityScheme::Basic,
                _ => return None,
            },
            "apiKey" => {
                let location = match scheme.get("in").and_then(Value::as_str)? {
                    "header" => ApiKeyLocation::Header,
                    "query" => ApiKeyLocation::Query,
                    _ => return None,
                };
                SecurityScheme::ApiKey {
                    location,
                    name: scheme.get("name").and_then(Value::as_str)?.to_string(),
                }
            }
            "oauth2" | "openIdConnect" => SecurityScheme::Bearer,
            _ => return None,
        };
        Some(resolved)
    }

    fn response(&self, status: ResponseStatus, response: &Value) -> Result<HttpResponsePattern, RunnerError> {
        let mut pattern = HttpResponsePattern::new(status);

        if let Some(declared) = response.get("headers").and_then(Value::as_object) {
            let mut headers = BTreeMap::new();
            for (name, header) in declared {
                if name.eq_ignore_ascii_case("content-type") {
                    continue;
                }
                let header = self.deref(header);
                let node = match header.get("schema") {
                    Some(schema) => self.schema_node(schema)?,
                    None => Arc::new(StringNode::default()),
                };
                let spec = if header.get("required").and_then(Value::as_bool).unwrap_or(false) {
                    ParamSpec::mandatory(node)
                } else {
                    ParamSpec::optional(node)
                };
                headers.insert(name.clone(), spec);
            }
            pattern = pattern.with_headers(KeyedPattern::new(FacetKind::Header, headers));
        }

        if let Some((content_type, media)) = pick_media(response) {
            pattern = pattern.with_content_type(content_type);
            if let Some(schema) = media.get("schema") {
                pattern = pattern.with_body(self.schema_node(schema)?);
            }
        }
        Ok(pattern)
    }
}

fn parse_status(status: &str) -> Option<ResponseStatus> {
    match status {
        "default" => Some(ResponseStatus::Default),
        "4XX" | "4xx" => Some(ResponseStatus::ClientError),
        code => code.parse().ok().map(ResponseStatus::Code),
    }
}

/// Declared types; `type` may be a string or (3.1) a list
fn type_names(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn primary_type(schema: &Value) -> Option<&str> {
    type_names(schema).into_iter().find(|t| *t != "null")
}

fn required_names(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn properties(schema: &Value) -> impl Iterator<Item = (&String, &Value)> {
    schema.get("properties").and_then(Value::as_object).into_iter().flatten()
}

fn usize_field(schema: &Value, key: &str) -> Option<usize> {
    schema.get(key).and_then(Value::as_u64).and_then(|v| usize::try_from(v).ok())
}

fn f64_field(schema: &Value, key: &str) -> Option<f64> {
    schema.get(key).and_then(Value::as_f64)
}

/// The media type to test with: JSON first, then forms, then anything
fn pick_media(holder: &Value) -> Option<(&str, &Value)> {
    let content = holder.get("content").and_then(Value::as_object)?;
    let rank = |media_type: &str| {
        if media_type == "application/json" {
            0
        } else if media_type.ends_with("+json") || media_type.ends_with("/json") {
            1
        } else if media_type == "application/x-www-form-urlencoded" || media_type == "multipart/form-data" {
            2
        } else {
            3
        }
    };
    content
        .iter()
        .min_by_key(|(media_type, _)| rank(media_type))
        .map(|(media_type, media)| (media_type.as_str(), media))
}

/// `example` (named "example") and every entry of `examples`
fn named_examples(holder: &Value, document: &Document<'_>) -> Vec<(String, Value)> {
    let mut found = Vec::new();
    if let Some(example) = holder.get("example") {
        found.push(("example".to_string(), example.clone()));
    }
    if let Some(examples) = holder.get("examples").and_then(Value::as_object) {
        for (name, example) in examples {
            if let Some(value) = document.deref(example).get("value") {
                found.push((name.clone(), value.clone()));
            }
        }
    }
    found
}

/// Example names declared on a response's media types
fn example_names(response: &Value) -> Vec<String> {
    response
        .get("content")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|content| content.values())
        .filter_map(|media| media.get("examples").and_then(Value::as_object))
        .flat_map(|examples| examples.keys().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractkit_core::{HttpRequest, HttpResponse, NonGenerative};
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Petstore", "version": "1"},
            "components": {
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "tag": {"type": "string", "nullable": true},
                            "parent": {"$ref": "#/components/schemas/Pet"}
                        }
                    }
                },
                "securitySchemes": {
                    "token": {"type": "http", "scheme": "bearer"}
                }
            },
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"},
                         "examples": {"rex": {"value": 7}}}
                    ],
                    "get": {
                        "summary": "fetch pet",
                        "security": [{"token": []}],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                            },
                            "404": {"description": "missing"}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn loads_operations_and_examples() {
        let feature = OpenApiLoader::new().from_value(&petstore()).unwrap();
        assert_eq!(feature.name, "Petstore");
        assert_eq!(feature.scenarios.len(), 2);

        let ok = &feature.scenarios[0];
        assert_eq!(ok.request.operation(), "GET /pets/{petId}");
        assert_eq!(ok.request.security, vec![SecurityScheme::Bearer]);
        assert_eq!(ok.examples.rows.len(), 1);
        assert_eq!(ok.examples.rows[0].column("petId"), Some("7"));
        assert!(feature.scenarios[1].examples.is_empty());
    }

    #[test]
    fn recursive_schema_matches_and_generates() {
        let feature = OpenApiLoader::new().from_value(&petstore()).unwrap();
        let ok = &feature.scenarios[0];
        let response = HttpResponse::new(200).with_body(json!({"name": "a", "parent": {"name": "b", "tag": null}}));
        assert!(ok.matches_response(&response).is_success());
        let generated = ok.generate_http_response(&BTreeMap::new()).unwrap();
        assert!(generated.body["name"].is_string());
    }

    #[test]
    fn example_row_pins_the_path() {
        let feature = OpenApiLoader::new().from_value(&petstore()).unwrap();
        let tests: Vec<_> = feature
            .generate_contract_tests(Arc::new(NonGenerative))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tests.len(), 1);
        let request: HttpRequest = tests[0].generate_request().unwrap();
        assert_eq!(request.path, "/pets/7");
        assert!(request.header("Authorization").unwrap().starts_with("Bearer "));
    }

    #[test]
    fn form_bodies_become_form_fields() {
        let spec = json!({
            "paths": {"/login": {"post": {
                "requestBody": {"content": {"application/x-www-form-urlencoded": {"schema": {
                    "type": "object", "required": ["user"],
                    "properties": {"user": {"type": "string"}, "remember": {"type": "boolean"}}
                }}}},
                "responses": {"204": {"description": "ok"}}
            }}}
        });
        let feature = OpenApiLoader::new().from_value(&spec).unwrap();
        let request = &feature.scenarios[0].request;
        assert_eq!(request.form_fields.params().len(), 2);
        assert!(!request.form_fields.params()["user"].optional);
        assert_eq!(request.content_type.as_deref(), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn yaml_is_sniffed_by_extension() {
        let spec = parse_spec(Path::new("api.yaml"), "openapi: 3.0.0\npaths: {}\n").unwrap();
        assert_eq!(spec["openapi"], "3.0.0");
        assert!(parse_spec(Path::new("api"), "{\"paths\": {}}").is_ok());
        assert!(matches!(parse_spec(Path::new("api.json"), "nope"), Err(RunnerError::Parse(_))));
    }
}
