//! Failure reasons and fluff levels

use serde::{Deserialize, Serialize};

/// Why a match failed, when the failure is of a well-known structural kind.
///
/// The fluff level ranks how superficial a failure is: 0 means the candidate
/// matched the message shape and disagreed on content, higher levels mean the
/// candidate was probably never meant for this input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Segment count or a literal segment differs
    UrlPathMismatch,
    /// Same shape, but a path parameter rejected its value
    UrlPathParamMismatchButSameStructure,
    /// HTTP method differs
    MethodMismatch,
    /// Declared and actual content types differ
    ContentTypeMismatch,
    /// Response status differs
    StatusMismatch,
}

impl FailureReason {
    /// Ranking used to suppress noisy candidates (0 = most meaningful)
    #[must_use]
    pub const fn fluff_level(self) -> u8 {
        match self {
            Self::UrlPathMismatch | Self::MethodMismatch => 2,
            Self::UrlPathParamMismatchButSameStructure
            | Self::ContentTypeMismatch
            | Self::StatusMismatch => 1,
        }
    }

    /// Whether the candidate got far enough to compare structured content
    #[must_use]
    pub const fn object_match_occurred(self) -> bool {
        matches!(self, Self::UrlPathParamMismatchButSameStructure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fluff_ordering() {
        assert!(
            FailureReason::ContentTypeMismatch.fluff_level()
                < FailureReason::UrlPathMismatch.fluff_level()
        );
        assert_eq!(FailureReason::MethodMismatch.fluff_level(), 2);
    }

    #[test]
    fn object_match_flag() {
        assert!(FailureReason::UrlPathParamMismatchButSameStructure.object_match_occurred());
        assert!(!FailureReason::UrlPathMismatch.object_match_occurred());
    }
}
