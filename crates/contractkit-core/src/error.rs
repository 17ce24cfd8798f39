//! Error types for contract evaluation
//!
//! Mismatches are not errors: they are [`crate::MatchResult::Failure`] values.
//! The types here cover the cases where evaluation itself cannot proceed.

use thiserror::Error;

/// Terminal contract-level error: the contract (or an example in it) is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// A `(token)` that is neither built in nor registered
    #[error("Unknown pattern {0}")]
    UnknownPattern(String),
    /// Literal text that cannot be read as the declared type
    #[error("\"{text}\" is not a valid {expected}")]
    Parse { text: String, expected: String },
    /// An example value that the schema it illustrates rejects
    #[error("Example {example} does not match {expected}: {reason}")]
    InvalidExample {
        example: String,
        expected: String,
        reason: String,
    },
    /// Path templates must start with `/`
    #[error("Invalid path template {0}")]
    InvalidPathTemplate(String),
    /// Dictionary source that is not a JSON object of path → value
    #[error("Invalid dictionary: {0}")]
    InvalidDictionary(String),
    /// Constraints no value can satisfy (e.g. an empty numeric range)
    #[error("Cannot generate a value for {0}")]
    Ungeneratable(String),
}

/// Raised by the cycle guard when a schema node would be expanded inside itself
/// once too often.
///
/// Never shown to users: callers either propagate it as a hard failure or turn
/// it into "no candidate".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid pattern cycle: {type_alias} at \"{lookup_path}\"")]
pub struct CycleSignal {
    pub type_alias: String,
    pub lookup_path: String,
}

/// Error type of generation: either a cycle cut-off or a broken contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Cycle(#[from] CycleSignal),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl EngineError {
    #[must_use]
    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}

/// Converts a cycle cut-off into "no candidate" while keeping real errors.
pub trait CycleExt<T> {
    /// `Ok(None)` when the guard fired, `Ok(Some(_))` on success, `Err` otherwise.
    ///
    /// # Errors
    ///
    /// Returns any non-cycle error unchanged.
    fn cycle_as_none(self) -> Result<Option<T>, EngineError>;
}

impl<T> CycleExt<T> for Result<T, EngineError> {
    fn cycle_as_none(self) -> Result<Option<T>, EngineError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(EngineError::Cycle(signal)) => {
                tracing::debug!(%signal, "cycle guard cut off candidate");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_becomes_none() {
        let r: Result<u8, EngineError> = Err(CycleSignal {
            type_alias: "(Tree)".into(),
            lookup_path: "child".into(),
        }
        .into());
        assert_eq!(r.cycle_as_none(), Ok(None));
    }

    #[test]
    fn contract_error_survives() {
        let r: Result<u8, EngineError> =
            Err(ContractError::UnknownPattern("(Nope)".into()).into());
        assert!(matches!(r.cycle_as_none(), Err(EngineError::Contract(_))));
    }

    #[test]
    fn display_messages() {
        let e = ContractError::Parse {
            text: "abc".into(),
            expected: "number".into(),
        };
        assert_eq!(e.to_string(), "\"abc\" is not a valid number");
    }
}
