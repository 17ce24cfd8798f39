//! Match outcomes: success, failure trees, breadcrumbs and fluff ranking

mod reason;
mod report;
mod results;

use std::collections::BTreeMap;

pub use reason::FailureReason;
pub use report::{FailureReport, ReportEntry, join_breadcrumbs};
pub use results::{NoMatchingScenario, Results};

/// Outcome of matching a value (or a whole message) against a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success(Success),
    Failure(Failure),
}

/// A successful match.
///
/// `partial` carries an advisory note when the match only succeeded against a
/// fallback (e.g. a `default` response).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Success {
    pub partial: Option<String>,
    pub bindings: BTreeMap<String, String>,
}

/// A failed match. Failures nest through `causes`; each level may add a
/// breadcrumb segment describing where in the message it happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    pub message: String,
    pub causes: Vec<Failure>,
    pub breadcrumb: String,
    pub reason: Option<FailureReason>,
    /// The failure is advisory (rendered as a success with a note)
    pub partial: bool,
}

impl MatchResult {
    #[must_use]
    pub fn success() -> Self {
        Self::Success(Success::default())
    }

    #[must_use]
    pub fn partial_success(note: impl Into<String>) -> Self {
        Self::Success(Success {
            partial: Some(note.into()),
            bindings: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(message))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Success, or a failure flagged as advisory only
    #[must_use]
    pub const fn is_acceptable(&self) -> bool {
        match self {
            Self::Success(_) => true,
            Self::Failure(f) => f.partial,
        }
    }

    #[must_use]
    pub const fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    #[must_use]
    pub fn into_failure(self) -> Option<Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    /// Prepend a breadcrumb segment; successes pass through unchanged.
    #[must_use]
    pub fn breadcrumb(self, label: impl Into<String>) -> Self {
        match self {
            Self::Success(s) => Self::Success(s),
            Self::Failure(f) => Self::Failure(f.breadcrumb(label)),
        }
    }

    #[must_use]
    pub fn with_reason(self, reason: FailureReason) -> Self {
        match self {
            Self::Success(s) => Self::Success(s),
            Self::Failure(f) => Self::Failure(f.with_reason(reason)),
        }
    }

    #[must_use]
    pub fn with_binding(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            Self::Success(mut s) => {
                s.bindings.insert(name.into(), value.into());
                Self::Success(s)
            }
            failure => failure,
        }
    }

    /// Fluff level of a failure; successes rank as 0
    #[must_use]
    pub fn fluff_level(&self) -> u8 {
        self.as_failure().map_or(0, Failure::fluff_level)
    }

    /// Report text for humans. Successes with a note render the note.
    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::Success(s) => s.partial.clone().unwrap_or_default(),
            Self::Failure(f) => f.report().to_string(),
        }
    }
}

impl From<Failure> for MatchResult {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

impl Failure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Combine independent failures; `None` when there were none.
    ///
    /// A single failure is returned as is. Several become causes of one
    /// message-less failure whose reason is the least fluffy of theirs.
    #[must_use]
    pub fn merge(failures: Vec<Failure>) -> Option<Failure> {
        match failures.len() {
            0 => None,
            1 => failures.into_iter().next(),
            _ => {
                let reason = merged_reason(&failures);
                let partial = failures.iter().all(|f| f.partial);
                Some(Failure {
                    message: String::new(),
                    causes: failures,
                    breadcrumb: String::new(),
                    reason,
                    partial,
                })
            }
        }
    }

    /// `MatchResult` for a list of independent failures
    #[must_use]
    pub fn result_of(failures: Vec<Failure>) -> MatchResult {
        Self::merge(failures).map_or_else(MatchResult::success, MatchResult::Failure)
    }

    /// Wrap in a parent whose breadcrumb is `label`. An unlabelled failure
    /// takes the label directly.
    #[must_use]
    pub fn breadcrumb(self, label: impl Into<String>) -> Self {
        let label = label.into();
        if label.is_empty() {
            return self;
        }
        if self.breadcrumb.is_empty() {
            return Self {
                breadcrumb: label,
                ..self
            };
        }
        Self {
            message: String::new(),
            reason: self.reason,
            partial: self.partial,
            breadcrumb: label,
            causes: vec![self],
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: FailureReason) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.causes.push(cause);
        self
    }

    #[must_use]
    pub fn into_partial(mut self) -> Self {
        self.partial = true;
        self
    }

    #[must_use]
    pub fn fluff_level(&self) -> u8 {
        self.reason.map_or(0, FailureReason::fluff_level)
    }

    #[must_use]
    pub fn report(&self) -> FailureReport {
        FailureReport::from_failure(self)
    }
}

/// Least fluffy reason of `failures`. A failure without a reason is level 0,
/// so its presence clears the merged reason.
fn merged_reason(failures: &[Failure]) -> Option<FailureReason> {
    if failures.iter().any(|f| f.reason.is_none()) {
        return None;
    }
    failures
        .iter()
        .filter_map(|f| f.reason)
        .min_by_key(|r| r.fluff_level())
}
