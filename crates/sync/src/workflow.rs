//! Workflow transition validator.
//!
//! Pure functions over an explicit snapshot of an issue's labels and
//! comments. The validator never blocks a label change; it only produces
//! advisories that callers post as comments. Status labels stay mutable by
//! humans at all times.

use std::collections::BTreeSet;

use crate::labels::Status;

/// Comment tokens that count as an explanation for a blocked issue.
const BLOCKED_EXPLANATION_TOKENS: [&str; 3] = ["blocked", "dependency", "waiting"];

/// Heading of the blocked advisory. Comments carrying it are the
/// validator's own output and never count as an explanation.
const BLOCKED_ADVISORY_HEADING: &str = "Blocked without explanation";

/// Point-in-time view of an issue taken once per event, so validation and
/// the subsequent label write see the same state.
#[derive(Debug, Clone, Default)]
pub struct TransitionSnapshot {
    /// Labels on the issue before the event.
    pub current: BTreeSet<String>,
    /// Labels the event is adding.
    pub incoming: BTreeSet<String>,
    /// Comment bodies on the issue, oldest first.
    pub comments: Vec<String>,
}

/// A non-blocking annotation for a workflow transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Moving to a status whose prerequisite lane was skipped.
    InvalidTransition {
        /// The status being entered.
        to: Status,
        /// The status that should have been visited first.
        requires: Status,
    },
    /// Entering measure: remind what to verify before learn.
    MeasureChecklist,
    /// Entering learn: remind to capture learnings.
    LearnChecklist,
    /// Blocked without any explanatory comment.
    BlockedExplanation,
}

impl Advisory {
    /// Markdown comment body for this advisory.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::InvalidTransition { to, requires } => format!(
                "⚠️ **Invalid workflow transition**\n\n\
                 This issue moved to `status-{to}` without `status-{requires}`. \
                 BML expects {requires} before {to}: capture what you intend to \
                 build, then move on.\n\n\
                 The label change has not been reverted; this is advisory only."
            ),
            Self::MeasureChecklist => "📊 **Entering measure**\n\n\
                 Before moving to learn:\n\
                 - [ ] Test the implementation\n\
                 - [ ] Validate against the original requirements\n\
                 - [ ] Document the results\n\
                 - [ ] Prepare findings for the learn phase"
                .to_string(),
            Self::LearnChecklist => "📚 **Entering learn**\n\n\
                 Capture what this cycle taught you:\n\
                 - [ ] What worked, what didn't, and why\n\
                 - [ ] Follow-up ideas worth new issues\n\n\
                 Add the `learning-captured` label once learnings are recorded."
                .to_string(),
            Self::BlockedExplanation => "🚧 **Blocked without explanation**\n\n\
                 This issue carries `status-blocked` but no comment explains \
                 why. Please add a comment describing what it is blocked on \
                 (the dependency, or what you are waiting for)."
                .to_string(),
        }
    }
}

/// Evaluate a snapshot and return every advisory it warrants.
///
/// Each rule fires at most once per evaluation. No rule ever rejects the
/// underlying label mutation.
#[must_use]
pub fn review(snapshot: &TransitionSnapshot) -> Vec<Advisory> {
    let mut advisories = Vec::new();

    if entering(snapshot, Status::Build) && !has_status(&snapshot.current, Status::Plan) {
        advisories.push(Advisory::InvalidTransition {
            to: Status::Build,
            requires: Status::Plan,
        });
    }

    if entering(snapshot, Status::Measure) {
        advisories.push(Advisory::MeasureChecklist);
    }

    if entering(snapshot, Status::Learn) {
        advisories.push(Advisory::LearnChecklist);
    }

    let blocked_after_event = has_status(&snapshot.current, Status::Blocked)
        || has_status(&snapshot.incoming, Status::Blocked);
    if blocked_after_event && !has_blocked_explanation(&snapshot.comments) {
        advisories.push(Advisory::BlockedExplanation);
    }

    advisories
}

fn entering(snapshot: &TransitionSnapshot, status: Status) -> bool {
    has_status(&snapshot.incoming, status)
}

fn has_status(labels: &BTreeSet<String>, status: Status) -> bool {
    labels.contains(&status.label())
}

fn has_blocked_explanation(comments: &[String]) -> bool {
    comments
        .iter()
        .filter(|comment| !comment.contains(BLOCKED_ADVISORY_HEADING))
        .any(|comment| {
            let lowered = comment.to_lowercase();
            BLOCKED_EXPLANATION_TOKENS
                .iter()
                .any(|token| lowered.contains(token))
        })
}
