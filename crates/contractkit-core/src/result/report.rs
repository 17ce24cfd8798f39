//! Failure rendering
//!
//! The text format is consumed by downstream tooling and must stay stable:
//! breadcrumbs joined with `.`, array indices appended as `[n]` with no
//! separator, each leaf rendered as
//!
//! ```text
//! >> REQUEST.BODY.items[0].name
//!
//!    Expected string, actual was 10 (number)
//! ```

use std::fmt;

use super::Failure;

const INDENT: &str = "   ";

/// One leaf of a failure tree: where it happened and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub path: String,
    pub messages: Vec<String>,
}

/// Flattened view of a failure tree, one entry per leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    entries: Vec<ReportEntry>,
}

impl FailureReport {
    #[must_use]
    pub fn from_failure(failure: &Failure) -> Self {
        let mut entries = Vec::new();
        collect(failure, &mut Vec::new(), &mut Vec::new(), &mut entries);
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Breadcrumb paths of every leaf, in tree order
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn collect<'a>(
    failure: &'a Failure,
    path: &mut Vec<&'a str>,
    messages: &mut Vec<&'a str>,
    out: &mut Vec<ReportEntry>,
) {
    let pushed_crumb = !failure.breadcrumb.is_empty();
    if pushed_crumb {
        path.push(&failure.breadcrumb);
    }
    let pushed_message = !failure.message.is_empty();
    if pushed_message {
        messages.push(&failure.message);
    }

    if failure.causes.is_empty() {
        out.push(ReportEntry {
            path: join_breadcrumbs(path.iter().copied()),
            messages: messages.iter().map(|m| (*m).to_string()).collect(),
        });
    } else {
        for cause in &failure.causes {
            collect(cause, path, messages, out);
        }
    }

    if pushed_message {
        messages.pop();
    }
    if pushed_crumb {
        path.pop();
    }
}

/// Join breadcrumb segments: `.` between names, nothing before `[index]`.
pub fn join_breadcrumbs<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() && !segment.starts_with('[') {
            joined.push('.');
        }
        joined.push_str(segment);
    }
    joined
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_empty() {
            write!(f, ">> {}", self.path)?;
            if !self.messages.is_empty() {
                f.write_str("\n\n")?;
            }
        }
        let lines: Vec<String> = self
            .messages
            .iter()
            .flat_map(|m| m.lines())
            .map(|line| format!("{INDENT}{line}"))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("\n\n"))
    }
}
