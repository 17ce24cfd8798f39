//! Sends generated requests to a live server

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use reqwest::blocking::multipart::{Form, Part};
use serde_json::Value;

use contractkit_core::http::media_type;
use contractkit_core::{ExecutorError, HttpRequest, HttpResponse, TestExecutor};

use crate::RunnerError;

/// [`TestExecutor`] backed by a blocking reqwest client.
///
/// Configured headers are sent with every request and take precedence over
/// generated values of the same name, so real credentials replace the
/// placeholder tokens produced for security schemes.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::blocking::Client,
    base_url: String,
    headers: HashMap<String, String>,
    timeout_secs: u64,
}

impl HttpExecutor {
    /// # Errors
    ///
    /// [`RunnerError::Http`] if the client cannot be built.
    pub fn new(base_url: &str, headers: HashMap<String, String>, timeout_secs: u64) -> Result<Self, RunnerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RunnerError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            timeout_secs,
        })
    }

    fn url(&self, request: &HttpRequest) -> String {
        format!("{}{}", self.base_url, request.path)
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::blocking::RequestBuilder, ExecutorError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ExecutorError::Transport(format!("invalid HTTP method '{}'", request.method)))?;
        let mut builder = self.client.request(method, self.url(request));

        let mut headers: BTreeMap<&str, &str> = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (name, value) in &self.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name, value);
        }
        for (name, value) in headers {
            // Values invalid in HTTP (e.g. \r\n) never reach the server
            if reqwest::header::HeaderValue::from_str(value).is_ok() {
                builder = builder.header(name, value);
            } else {
                tracing::debug!(header = name, "skipping header value invalid in HTTP");
            }
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query.iter().collect::<Vec<_>>());
        }

        if !request.form_fields.is_empty() {
            builder = builder.form(&request.form_fields);
        } else if !request.multipart.is_empty() {
            let mut form = Form::new();
            for part in &request.multipart {
                let mut body = Part::text(part.content.clone());
                if let Some(filename) = &part.filename {
                    body = body.file_name(filename.clone());
                }
                if let Some(content_type) = &part.content_type {
                    body = body
                        .mime_str(content_type)
                        .map_err(|e| ExecutorError::Transport(e.to_string()))?;
                }
                form = form.part(part.name.clone(), body);
            }
            builder = builder.multipart(form);
        } else if !request.body.is_null() {
            builder = match (&request.body, request.content_type().map(media_type)) {
                (Value::String(text), Some(content_type)) if !content_type.ends_with("json") => builder.body(text.clone()),
                (body, _) => builder.json(body),
            };
        }
        Ok(builder)
    }
}

impl TestExecutor for HttpExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError> {
        let builder = self.build(request)?;
        let start = Instant::now();
        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                ExecutorError::Timeout(self.timeout_secs)
            } else {
                ExecutorError::Transport(e.to_string())
            }
        })?;
        let elapsed = start.elapsed().as_secs_f64();

        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        let text = response
            .text()
            .map_err(|e| ExecutorError::InvalidResponse(e.to_string()))?;
        tracing::debug!(request = %request, status, elapsed, "response received");

        let mut converted = HttpResponse::new(status).with_body(parse_body(&text, headers.get("content-type")));
        converted.headers = headers;
        Ok(converted)
    }
}

/// Response text as JSON when it parses, otherwise as a string
fn parse_body(text: &str, content_type: Option<&String>) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    let json_like = content_type.is_none_or(|ct| media_type(ct).ends_with("json"));
    if json_like {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor(headers: &[(&str, &str)]) -> HttpExecutor {
        let headers = headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        HttpExecutor::new("http://localhost:9/api/", headers, 1).unwrap()
    }

    #[test]
    fn base_url_is_joined_without_double_slash() {
        let request = HttpRequest::new("GET", "/pets/1");
        assert_eq!(executor(&[]).url(&request), "http://localhost:9/api/pets/1");
    }

    #[test]
    fn configured_headers_replace_generated_ones() {
        let request = HttpRequest::new("GET", "/pets")
            .with_header("authorization", "Bearer generated")
            .with_query("limit", "5");
        let built = executor(&[("Authorization", "Bearer real")])
            .build(&request)
            .unwrap()
            .build()
            .unwrap();
        let values: Vec<_> = built.headers().get_all("authorization").iter().collect();
        assert_eq!(values, vec!["Bearer real"]);
        assert_eq!(built.url().query(), Some("limit=5"));
    }

    #[test]
    fn json_body_is_serialized() {
        let request = HttpRequest::new("POST", "/pets").with_body(json!({"name": "rex"}));
        let built = executor(&[]).build(&request).unwrap().build().unwrap();
        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"name": "rex"}));
    }

    #[test]
    fn bodies_parse_by_content_type() {
        assert_eq!(parse_body("", None), Value::Null);
        assert_eq!(parse_body("{\"a\":1}", Some(&"application/json; charset=utf-8".to_string())), json!({"a": 1}));
        assert_eq!(parse_body("42", Some(&"text/plain".to_string())), json!("42"));
        assert_eq!(parse_body("not json", None), json!("not json"));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let result = executor(&[]).execute(&HttpRequest::new("GET", "/"));
        assert!(matches!(result, Err(ExecutorError::Transport(_) | ExecutorError::Timeout(_))));
    }
}
