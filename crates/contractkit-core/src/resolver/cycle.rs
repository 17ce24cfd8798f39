//! Cycle guard for self-referential schemas
//!
//! The guard is a persistent stack: pushing returns a new guard that shares
//! its tail with the old one, so sibling traversals never see each other's
//! frames.

use std::sync::Arc;

use crate::error::CycleSignal;

/// How revisits are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleMode {
    /// Count expansions of the same type; the third one is a cycle
    #[default]
    IdentityCount,
    /// Track lookup paths; revisiting a path (or a descendant of it) is a cycle
    LookupPath,
}

#[derive(Debug)]
struct Frame {
    alias: String,
    path: String,
    parent: Option<Arc<Frame>>,
}

#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    mode: CycleMode,
    top: Option<Arc<Frame>>,
    /// One-shot pass for this exact lookup path
    marker: Option<String>,
    /// A marker was already used on this traversal path
    marker_spent: bool,
}

/// Nesting allowed per type in identity-count mode
const MAX_SAME_TYPE_FRAMES: usize = 2;

impl CycleGuard {
    #[must_use]
    pub fn new(mode: CycleMode) -> Self {
        Self {
            mode,
            top: None,
            marker: None,
            marker_spent: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> CycleMode {
        self.mode
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    #[must_use]
    pub fn with_marker(&self, path: impl Into<String>) -> Self {
        Self {
            mode: self.mode,
            top: self.top.clone(),
            marker: Some(path.into()),
            marker_spent: self.marker_spent,
        }
    }

    /// Register `alias` at `path`, or signal a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CycleSignal`] when the expansion would recurse too deeply.
    pub fn enter(&self, alias: &str, path: &str) -> Result<Self, CycleSignal> {
        let mut marker = self.marker.clone();
        let mut marker_spent = self.marker_spent;
        let conflict = match self.mode {
            CycleMode::IdentityCount => {
                self.frames().filter(|f| f.alias == alias).count() >= MAX_SAME_TYPE_FRAMES
            }
            CycleMode::LookupPath => self
                .frames()
                .any(|f| f.alias == alias && is_same_or_ancestor(&f.path, path)),
        };

        if conflict {
            if !marker_spent && marker.as_deref() == Some(path) {
                marker = None;
                marker_spent = true;
            } else {
                return Err(CycleSignal {
                    type_alias: alias.to_string(),
                    lookup_path: path.to_string(),
                });
            }
        }

        Ok(Self {
            mode: self.mode,
            top: Some(Arc::new(Frame {
                alias: alias.to_string(),
                path: path.to_string(),
                parent: self.top.clone(),
            })),
            marker,
            marker_spent,
        })
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.top.as_deref(), |f| f.parent.as_deref())
    }
}

/// `ancestor` equals `path`, or is a `.`/`[` separated prefix of it
fn is_same_or_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() || ancestor == path {
        return true;
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_allows_one_self_nesting() {
        let g = CycleGuard::new(CycleMode::IdentityCount);
        let g = g.enter("Tree", "").unwrap();
        let g = g.enter("Tree", "child").unwrap();
        let err = g.enter("Tree", "child.child").unwrap_err();
        assert_eq!(err.type_alias, "Tree");
        assert_eq!(err.lookup_path, "child.child");
    }

    #[test]
    fn identity_counts_per_type() {
        let g = CycleGuard::new(CycleMode::IdentityCount)
            .enter("A", "")
            .unwrap()
            .enter("B", "b")
            .unwrap()
            .enter("A", "b.a")
            .unwrap();
        assert!(g.enter("B", "b.a.b").is_ok());
        assert!(g.enter("A", "b.a.a").is_err());
    }

    #[test]
    fn siblings_do_not_share_frames() {
        let root = CycleGuard::new(CycleMode::IdentityCount).enter("Tree", "").unwrap();
        let left = root.enter("Tree", "left").unwrap();
        let right = root.enter("Tree", "right").unwrap();
        assert_eq!(left.depth(), 2);
        assert_eq!(right.depth(), 2);
        assert_eq!(root.depth(), 1);
    }

    #[test]
    fn lookup_path_detects_descendant() {
        let g = CycleGuard::new(CycleMode::LookupPath).enter("Tree", "").unwrap();
        assert!(g.enter("Tree", "child").is_err());
        assert!(g.enter("Leaf", "child").is_ok());
    }

    #[test]
    fn marker_allows_exactly_one_pass() {
        let g = CycleGuard::new(CycleMode::LookupPath)
            .enter("Tree", "")
            .unwrap()
            .with_marker("child");
        let g = g.enter("Tree", "child").unwrap();
        assert!(g.enter("Tree", "child.child").is_err());
        assert!(g.with_marker("child.child").enter("Tree", "child.child").is_err());
    }

    #[test]
    fn prefix_must_end_at_separator() {
        assert!(is_same_or_ancestor("items", "items[0]"));
        assert!(is_same_or_ancestor("a", "a.b"));
        assert!(!is_same_or_ancestor("item", "items"));
        assert!(is_same_or_ancestor("", "anything"));
    }
}
