//! Immutable evaluation context
//!
//! Every contextual change (a deeper lookup path, a new cycle frame, a
//! different key policy) returns a new [`Resolver`] sharing the unchanged
//! fields. A resolver can therefore be handed to independent traversals
//! without any of them seeing the others' state.

mod cycle;
mod tokens;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dictionary::Dictionary;
use crate::error::{ContractError, EngineError};
use crate::key_check::KeyPolicy;
use crate::mismatch::{DefaultMismatchMessages, MismatchMessages};
use crate::node::{Node, SchemaNode};
use crate::result::{Failure, MatchResult};
use crate::strategy::{GenerationStrategy, NonGenerative};

pub use cycle::{CycleGuard, CycleMode};
pub use tokens::{builtin_pattern, is_pattern_token};

#[derive(Clone)]
pub struct Resolver {
    facts: Arc<BTreeMap<String, Value>>,
    patterns: Arc<BTreeMap<String, Node>>,
    strategy: Arc<dyn GenerationStrategy>,
    key_policy: KeyPolicy,
    messages: Arc<dyn MismatchMessages>,
    negative: bool,
    mock: bool,
    guard: CycleGuard,
    dictionary: Arc<Dictionary>,
    lookup_path: String,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("facts", &self.facts.len())
            .field("patterns", &self.patterns.keys().collect::<Vec<_>>())
            .field("strategy", &self.strategy)
            .field("key_policy", &self.key_policy)
            .field("negative", &self.negative)
            .field("mock", &self.mock)
            .field("cycle_mode", &self.guard.mode())
            .field("lookup_path", &self.lookup_path)
            .finish_non_exhaustive()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            facts: Arc::default(),
            patterns: Arc::default(),
            strategy: Arc::new(NonGenerative),
            key_policy: KeyPolicy::strict(),
            messages: Arc::new(DefaultMismatchMessages),
            negative: false,
            mock: false,
            guard: CycleGuard::default(),
            dictionary: Arc::default(),
            lookup_path: String::new(),
        }
    }
}

impl Resolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- builders -------------------------------------------------------

    #[must_use]
    pub fn with_facts(&self, facts: BTreeMap<String, Value>) -> Self {
        Self {
            facts: Arc::new(facts),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_patterns(&self, patterns: BTreeMap<String, Node>) -> Self {
        Self {
            patterns: Arc::new(patterns),
            ..self.clone()
        }
    }

    /// Registry shared with a feature's other scenarios
    #[must_use]
    pub fn with_shared_patterns(&self, patterns: Arc<BTreeMap<String, Node>>) -> Self {
        Self {
            patterns,
            ..self.clone()
        }
    }

    /// Register one named type, keeping the others
    #[must_use]
    pub fn with_pattern(&self, name: &str, node: Node) -> Self {
        let mut patterns = (*self.patterns).clone();
        patterns.insert(strip_parens(name).to_string(), node);
        self.with_patterns(patterns)
    }

    #[must_use]
    pub fn with_strategy(&self, strategy: Arc<dyn GenerationStrategy>) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_key_policy(&self, key_policy: KeyPolicy) -> Self {
        Self {
            key_policy,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_messages(&self, messages: Arc<dyn MismatchMessages>) -> Self {
        Self {
            messages,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_negative(&self, negative: bool) -> Self {
        Self {
            negative,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_mock(&self, mock: bool) -> Self {
        Self {
            mock,
            ..self.clone()
        }
    }

    /// Switch to the lookup-path cycle guard. Resets any cycle state.
    #[must_use]
    pub fn with_all_patterns_mandatory(&self, enabled: bool) -> Self {
        let mode = if enabled {
            CycleMode::LookupPath
        } else {
            CycleMode::IdentityCount
        };
        Self {
            guard: CycleGuard::new(mode),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_dictionary(&self, dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            ..self.clone()
        }
    }

    /// Descend into object key `key`
    #[must_use]
    pub fn with_lookup_key(&self, key: &str) -> Self {
        let lookup_path = if self.lookup_path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.lookup_path)
        };
        Self {
            lookup_path,
            ..self.clone()
        }
    }

    /// Descend into array element `index`
    #[must_use]
    pub fn with_lookup_index(&self, index: usize) -> Self {
        Self {
            lookup_path: format!("{}[{index}]", self.lookup_path),
            ..self.clone()
        }
    }

    /// Restart lookup paths at a new root (e.g. the response body)
    #[must_use]
    pub fn at_root(&self) -> Self {
        Self {
            lookup_path: String::new(),
            ..self.clone()
        }
    }

    // --- accessors ------------------------------------------------------

    #[must_use]
    pub fn facts(&self) -> &BTreeMap<String, Value> {
        &self.facts
    }

    #[must_use]
    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    #[must_use]
    pub fn patterns(&self) -> &BTreeMap<String, Node> {
        &self.patterns
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<dyn GenerationStrategy> {
        &self.strategy
    }

    #[must_use]
    pub fn is_generative(&self) -> bool {
        self.strategy.is_generative()
    }

    #[must_use]
    pub const fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    #[must_use]
    pub fn messages(&self) -> &dyn MismatchMessages {
        self.messages.as_ref()
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    #[must_use]
    pub const fn is_mock(&self) -> bool {
        self.mock
    }

    #[must_use]
    pub fn all_patterns_mandatory(&self) -> bool {
        self.guard.mode() == CycleMode::LookupPath
    }

    #[must_use]
    pub fn lookup_path(&self) -> &str {
        &self.lookup_path
    }

    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    // --- patterns -------------------------------------------------------

    /// Node for a type name, with or without parentheses: built-ins first,
    /// then registered types.
    ///
    /// # Errors
    ///
    /// [`ContractError::UnknownPattern`] if the name is not known.
    pub fn resolve_pattern(&self, name: &str) -> Result<Node, ContractError> {
        let bare = strip_parens(name);
        if let Some(node) = builtin_pattern(bare) {
            return Ok(node);
        }
        self.patterns
            .get(bare)
            .cloned()
            .ok_or_else(|| ContractError::UnknownPattern(format!("({bare})")))
    }

    /// Node for `text` when it is a `(token)`
    #[must_use]
    pub fn pattern_for_token(&self, text: &str) -> Option<Result<Node, ContractError>> {
        is_pattern_token(text).then(|| tokens::token_node(text, self))
    }

    /// Schema node for a stub or fact value: tokens become their types,
    /// everything else must be matched literally.
    ///
    /// # Errors
    ///
    /// [`ContractError::UnknownPattern`] for an unknown token.
    pub fn node_from_value(&self, value: &Value) -> Result<Node, ContractError> {
        tokens::node_from_value(value, self)
    }

    // --- evaluation -----------------------------------------------------

    /// Match `value` against `node`. In mock mode a `(token)` value is
    /// accepted when the node subsumes the token's type.
    #[must_use]
    pub fn matches(&self, node: &dyn SchemaNode, value: &Value) -> MatchResult {
        if self.mock {
            if let Value::String(text) = value {
                if let Some(token) = self.pattern_for_token(text) {
                    return match token {
                        Ok(token_node) => node.subsumes(token_node.as_ref(), self, self),
                        Err(e) => MatchResult::Failure(Failure::new(e.to_string())),
                    };
                }
            }
        }
        node.matches(value, self)
    }

    /// Match literal text (path segment, query or header value)
    #[must_use]
    pub fn matches_text(&self, node: &dyn SchemaNode, text: &str) -> MatchResult {
        if self.mock && is_pattern_token(text) {
            return self.matches(node, &Value::String(text.to_string()));
        }
        match node.parse(text, self) {
            Ok(value) => self.matches(node, &value),
            Err(_) => MatchResult::failure(
                self.messages
                    .mismatch(&node.type_name(), &format!("\"{text}\"")),
            ),
        }
    }

    /// Generate a value for `node`, preferring a dictionary entry for the
    /// current lookup path.
    ///
    /// # Errors
    ///
    /// [`EngineError::Cycle`] when a self-reference was cut off.
    pub fn generate(&self, node: &dyn SchemaNode) -> Result<Value, EngineError> {
        if !self.negative {
            if let Some(value) = self.dictionary.lookup(&self.lookup_path, &node.type_name()) {
                if node.matches(value, self).is_success() {
                    return Ok(value.clone());
                }
                tracing::warn!(
                    path = %self.lookup_path,
                    expected = %node.type_name(),
                    "dictionary value does not fit the schema, generating instead"
                );
            }
        }
        node.generate(self)
    }

    // --- cycle prevention -----------------------------------------------

    /// Run `f` with `alias` registered at the current lookup path.
    ///
    /// # Errors
    ///
    /// [`EngineError::Cycle`] if registering would recurse too deeply, or
    /// whatever `f` returns.
    pub fn with_cycle_prevention<T>(
        &self,
        alias: &str,
        f: impl FnOnce(&Resolver) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let guard = self.guard.enter(alias, &self.lookup_path)?;
        let inner = Self {
            guard,
            ..self.clone()
        };
        f(&inner)
    }

    /// Allow one more expansion at the current lookup path
    #[must_use]
    pub fn with_cycle_marker(&self) -> Self {
        Self {
            guard: self.guard.with_marker(self.lookup_path.clone()),
            ..self.clone()
        }
    }
}

fn strip_parens(name: &str) -> &str {
    name.strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .unwrap_or(name)
}
