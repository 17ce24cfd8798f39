//! Project configuration for contract testing

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::scenario::MatchSettings;
use crate::strategy::{GenerationStrategy, Generative, NonGenerative};

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// OpenAPI spec path (local file)
    pub spec: PathBuf,

    /// Base URL of the server to test
    pub base_url: String,

    /// HTTP headers sent with every request (auth, API keys, etc.)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Test every structurally distinct variant, plus negative tests
    #[serde(default)]
    pub generative: bool,

    /// Ignore undeclared keys instead of rejecting them
    #[serde(default)]
    pub extensible_schema: bool,

    /// Guard recursion by lookup path instead of by schema identity
    #[serde(default)]
    pub all_patterns_mandatory: bool,

    /// JSON dictionary of values to use for generated fields
    #[serde(default)]
    pub dictionary: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on the number of tests run
    #[serde(default)]
    pub max_tests: Option<usize>,

    /// Optional-key subsets tried per object or facet in generative mode
    #[serde(default = "default_max_key_combinations")]
    pub max_key_combinations: usize,

    /// Stub files checked by `stub-check`
    #[serde(default)]
    pub stubs: Vec<PathBuf>,
}

const fn default_timeout() -> u64 {
    30
}

const fn default_max_key_combinations() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: "http://localhost:8080".to_string(),
            headers: HashMap::new(),
            generative: false,
            extensible_schema: false,
            all_patterns_mandatory: false,
            dictionary: None,
            timeout_secs: default_timeout(),
            max_tests: None,
            max_key_combinations: default_max_key_combinations(),
            stubs: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.contractkit.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be loaded
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".contractkit.toml", ".contractkit.json", "contractkit.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    #[must_use]
    pub const fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            extensible_schema: self.extensible_schema,
            all_patterns_mandatory: self.all_patterns_mandatory,
        }
    }

    /// Generative (capped at `max_key_combinations`) or example-only
    #[must_use]
    pub fn strategy(&self) -> Arc<dyn GenerationStrategy> {
        if self.generative {
            Arc::new(Generative::new().with_max_key_combinations(self.max_key_combinations))
        } else {
            Arc::new(NonGenerative)
        }
    }

    /// Create example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# contractkit configuration

# OpenAPI spec (local file path)
spec = "openapi.yaml"

# Server to test
base_url = "http://localhost:8080"

# Test every structurally distinct request shape, plus invalid requests
# generative = true

# Ignore keys the contract does not declare
# extensible_schema = true

# Guard recursive schemas by lookup path instead of type identity
# all_patterns_mandatory = true

# Values to use for generated fields, keyed by body path ("name", "items[*].sku")
# dictionary = "dictionary.json"

# Per-request timeout in seconds
# timeout_secs = 30

# Stop after this many tests
# max_tests = 500

# Optional-key subsets tried per object or parameter list (generative mode)
# max_key_combinations = 64

# Stub files for `contractkit stub-check`
# stubs = ["stubs/get-pet.json"]

# HTTP headers (auth, api keys)
[headers]
Authorization = "Bearer your-token-here"
# X-API-Key = "your-api-key"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
