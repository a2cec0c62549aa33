//! BML status-label vocabulary.
//!
//! Status labels carry the kanban lane (`status-build`), priority labels
//! (`priority-high`, `priority-1.2.3`) live on an orthogonal axis the sync
//! path never touches.

use std::collections::BTreeSet;
use std::fmt;

/// Prefix of all workflow-status labels.
pub const STATUS_PREFIX: &str = "status-";

/// Prefix of all priority labels. Managed meta-repo-side only; the sync
/// path must never copy or remove these.
pub const PRIORITY_PREFIX: &str = "priority-";

/// Marker label attached to wrapper issues at creation time.
pub const SYNCED_LABEL: &str = "synced";

/// The seven BML kanban lanes. At most one status label is attached to an
/// issue at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Backlog,
    Plan,
    Build,
    Measure,
    Learn,
    Blocked,
    Archived,
}

impl Status {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Backlog,
        Self::Plan,
        Self::Build,
        Self::Measure,
        Self::Learn,
        Self::Blocked,
        Self::Archived,
    ];

    /// Bare status name (`"build"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Plan => "plan",
            Self::Build => "build",
            Self::Measure => "measure",
            Self::Learn => "learn",
            Self::Blocked => "blocked",
            Self::Archived => "archived",
        }
    }

    /// Full label name (`"status-build"`).
    #[must_use]
    pub fn label(self) -> String {
        format!("{STATUS_PREFIX}{}", self.as_str())
    }

    /// Parse a `status-*` label back into its status.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let name = label.strip_prefix(STATUS_PREFIX)?;
        Self::ALL.into_iter().find(|status| status.as_str() == name)
    }

    /// Label color, hex without `#`.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Backlog => "0366d6",
            Self::Plan => "0e8a16",
            Self::Build => "fbca04",
            Self::Measure => "d73a49",
            Self::Learn => "6f42c1",
            Self::Blocked => "e99695",
            Self::Archived => "586069",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a label is on the status axis.
#[must_use]
pub fn is_status_label(label: &str) -> bool {
    label.starts_with(STATUS_PREFIX)
}

/// Whether a label is on the priority axis.
#[must_use]
pub fn is_priority_label(label: &str) -> bool {
    label.starts_with(PRIORITY_PREFIX)
}

/// The `status-*` subset of a label set.
#[must_use]
pub fn status_subset<'a, I>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    labels
        .into_iter()
        .filter(|label| is_status_label(label))
        .cloned()
        .collect()
}
