//! The sync engine: wrapper resolution, propagation, archive closure.
//!
//! Every inbound event is processed as an independent unit of work; the
//! remote tracker is the only shared state. Propagation is a best-effort
//! sequence: each step's failure is logged on its own and never rolls back
//! earlier steps. Only retryable transport failures abort, surfacing to
//! the delivery mechanism's redelivery.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use tracker::{IssueState, IssueTracker, RepoName, TrackerError};

use crate::index::WrapperIndex;
use crate::labels::{self, SYNCED_LABEL};
use crate::workflow::{review, TransitionSnapshot};
use crate::wrapper::{parse_wrapper_title, provenance_body, wrapper_title, SourceRef};

/// A source-issue change, as delivered by a webhook or cross-repo dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssueEvent {
    /// Repository the issue lives in.
    pub source_repo: RepoName,
    /// Issue number within the source repository.
    pub number: u64,
    /// Issue title at event time.
    pub title: String,
    /// Issue body at event time.
    #[serde(default)]
    pub body: String,
    /// Open/closed state at event time.
    pub state: IssueState,
    /// Full label set at event time.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Tracker action that produced the event (`opened`, `labeled`, ...).
    #[serde(default)]
    pub action: String,
}

impl SourceIssueEvent {
    /// The source reference this event is about.
    #[must_use]
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            repo: self.source_repo.clone(),
            number: self.number,
        }
    }
}

/// Engine failure. Retryable transport conditions are the only ones that
/// abort a propagation sequence; everything else is logged at the failing
/// step and the sequence continues.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Retryable tracker failure; the caller's redelivery may retry.
    #[error("retryable tracker failure: {0}")]
    Transport(#[source] TrackerError),

    /// The wrapper could not be resolved or created; nothing to sync onto.
    #[error("wrapper resolution failed: {0}")]
    Resolve(#[source] TrackerError),
}

impl SyncError {
    /// Whether redelivering the event may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn resolve(err: TrackerError) -> Self {
        if err.is_retryable() {
            Self::Transport(err)
        } else {
            Self::Resolve(err)
        }
    }
}

/// Result of a wrapper lookup.
#[derive(Debug, Clone, Copy)]
pub struct WrapperHandle {
    /// Wrapper issue number in the meta repository.
    pub number: u64,
    /// Whether this call created the wrapper.
    pub created: bool,
}

/// Result of a completed propagation.
#[derive(Debug, Clone, Copy)]
pub struct SyncOutcome {
    /// Wrapper issue number in the meta repository.
    pub wrapper: u64,
    /// Whether the wrapper was created by this sync.
    pub created: bool,
}

/// Mirrors source issues into wrapper issues in the meta repository.
pub struct SyncEngine {
    tracker: Arc<dyn IssueTracker>,
    meta_repo: RepoName,
    index: WrapperIndex,
}

impl SyncEngine {
    /// Build an engine over a tracker, targeting one meta repository.
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>, meta_repo: RepoName, index: WrapperIndex) -> Self {
        Self {
            tracker,
            meta_repo,
            index,
        }
    }

    /// The meta repository wrappers live in.
    #[must_use]
    pub fn meta_repo(&self) -> &RepoName {
        &self.meta_repo
    }

    /// Find the wrapper for a source issue, creating it if absent.
    ///
    /// At most one wrapper exists per source issue: the persisted index is
    /// consulted first, then a title search over open and closed issues,
    /// and only then is a wrapper created. Attaching the `synced` marker
    /// label is best-effort; a repo without the label does not fail the
    /// operation.
    pub async fn resolve_wrapper(
        &self,
        source: &SourceRef,
        source_title: &str,
        source_body: &str,
    ) -> Result<WrapperHandle, SyncError> {
        if let Some(number) = self.index.get(source).await {
            debug!(source = %source, wrapper = number, "Wrapper found in index");
            return Ok(WrapperHandle {
                number,
                created: false,
            });
        }

        let token = source.token();
        let hits = self
            .tracker
            .search_issues(&self.meta_repo, &token)
            .await
            .map_err(SyncError::resolve)?;
        let candidates: Vec<_> = hits
            .iter()
            .filter(|hit| hit.title.contains(&token))
            .collect();

        if let Some(hit) = candidates.first() {
            if candidates.len() > 1 {
                warn!(
                    source = %source,
                    count = candidates.len(),
                    chosen = hit.number,
                    "Multiple wrapper candidates found, taking the first"
                );
            }
            self.index.record(source, hit.number).await;
            return Ok(WrapperHandle {
                number: hit.number,
                created: false,
            });
        }

        let title = wrapper_title(source, source_title);
        let body = provenance_body(source, source_body);
        let number = self
            .tracker
            .create_issue(&self.meta_repo, &title, &body, &[])
            .await
            .map_err(SyncError::resolve)?;

        if let Err(e) = self
            .tracker
            .add_labels(&self.meta_repo, number, &[SYNCED_LABEL.to_string()])
            .await
        {
            warn!(wrapper = number, error = %e, "Could not attach synced label");
        }

        self.index.record(source, number).await;
        info!(source = %source, wrapper = number, "Created wrapper issue");
        Ok(WrapperHandle {
            number,
            created: true,
        })
    }

    /// Mirror a source-issue event onto its wrapper: title, status labels,
    /// open/closed state. Priority labels and every other label axis on
    /// the wrapper are left untouched.
    #[instrument(skip(self, event), fields(source = %event.source_ref(), action = %event.action))]
    pub async fn propagate(&self, event: &SourceIssueEvent) -> Result<SyncOutcome, SyncError> {
        let source = event.source_ref();
        let handle = self
            .resolve_wrapper(&source, &event.title, &event.body)
            .await?;
        let wrapper = handle.number;

        // A freshly created wrapper already carries the current title.
        if !handle.created {
            let title = wrapper_title(&source, &event.title);
            if let Err(e) = self.tracker.edit_title(&self.meta_repo, wrapper, &title).await {
                if e.is_retryable() {
                    return Err(SyncError::Transport(e));
                }
                warn!(wrapper, error = %e, "Failed to refresh wrapper title");
            }
        }

        self.sync_status_labels(wrapper, &event.labels).await?;

        if let Err(e) = self
            .tracker
            .set_state(&self.meta_repo, wrapper, event.state)
            .await
        {
            if e.is_retryable() {
                return Err(SyncError::Transport(e));
            }
            warn!(wrapper, error = %e, "Failed to mirror wrapper state");
        }

        info!(wrapper, created = handle.created, "Sync complete");
        Ok(SyncOutcome {
            wrapper,
            created: handle.created,
        })
    }

    /// Replace the wrapper's `status-*` labels with the source's. Only the
    /// status axis is diffed; labels that are already correct are not
    /// churned.
    async fn sync_status_labels(
        &self,
        wrapper: u64,
        source_labels: &BTreeSet<String>,
    ) -> Result<(), SyncError> {
        let desired = labels::status_subset(source_labels);

        let current = match self.tracker.get_labels(&self.meta_repo, wrapper).await {
            Ok(current) => current,
            Err(e) if e.is_retryable() => return Err(SyncError::Transport(e)),
            Err(e) => {
                warn!(wrapper, error = %e, "Failed to read wrapper labels, skipping label sync");
                return Ok(());
            }
        };
        let current_status = labels::status_subset(&current);

        for stale in current_status.difference(&desired) {
            if let Err(e) = self
                .tracker
                .remove_label(&self.meta_repo, wrapper, stale)
                .await
            {
                if e.is_retryable() {
                    return Err(SyncError::Transport(e));
                }
                warn!(wrapper, label = %stale, error = %e, "Failed to remove stale status label");
            }
        }

        let missing: Vec<String> = desired.difference(&current_status).cloned().collect();
        if !missing.is_empty() {
            match self.tracker.add_labels(&self.meta_repo, wrapper, &missing).await {
                Ok(()) => {}
                Err(TrackerError::LabelNotConfigured { label, .. }) => {
                    warn!(wrapper, label = %label, "Status label not configured in meta repo, skipping");
                }
                Err(e) if e.is_retryable() => return Err(SyncError::Transport(e)),
                Err(e) => {
                    warn!(wrapper, error = %e, "Failed to add status labels");
                }
            }
        }

        Ok(())
    }

    /// React to a wrapper receiving the terminal `status-archived` label:
    /// close the source issue and leave a provenance comment on it.
    ///
    /// Returns the parsed source reference, or `None` when the issue's
    /// title carries no source reference (not every issue in the meta
    /// repository is a wrapper).
    #[instrument(skip(self, title), fields(wrapper = wrapper_number))]
    pub async fn close_archived(
        &self,
        wrapper_number: u64,
        title: &str,
    ) -> Result<Option<SourceRef>, SyncError> {
        let Some(source) = parse_wrapper_title(title) else {
            debug!("No source reference in title, nothing to close");
            return Ok(None);
        };

        if let Err(e) = self
            .tracker
            .set_state(&source.repo, source.number, IssueState::Closed)
            .await
        {
            if e.is_retryable() {
                return Err(SyncError::Transport(e));
            }
            warn!(source = %source, error = %e, "Failed to close source issue");
        }

        let comment = format!(
            "🗄️ Closed via archive: wrapper issue {meta}#{wrapper_number} was \
             labeled `status-archived`.",
            meta = self.meta_repo,
        );
        if let Err(e) = self
            .tracker
            .add_comment(&source.repo, source.number, &comment)
            .await
        {
            if e.is_retryable() {
                return Err(SyncError::Transport(e));
            }
            warn!(source = %source, error = %e, "Failed to comment archive closure on source");
        }

        info!(source = %source, "Propagated archive closure to source");
        Ok(Some(source))
    }

    /// Run the workflow validator over a snapshot and post each advisory
    /// as a comment on the given issue. Returns the number of advisories
    /// posted.
    pub async fn advise(
        &self,
        repo: &RepoName,
        number: u64,
        snapshot: &TransitionSnapshot,
    ) -> Result<usize, SyncError> {
        let advisories = review(snapshot);
        for advisory in &advisories {
            if let Err(e) = self.tracker.add_comment(repo, number, &advisory.body()).await {
                if e.is_retryable() {
                    return Err(SyncError::Transport(e));
                }
                warn!(repo = %repo, number, error = %e, "Failed to post advisory comment");
            }
        }
        if !advisories.is_empty() {
            info!(repo = %repo, number, count = advisories.len(), "Posted workflow advisories");
        }
        Ok(advisories.len())
    }

    /// Fetch an issue's comments for validation. Advisory evaluation is
    /// best-effort, so a failed fetch degrades to an empty history.
    pub async fn comment_snapshot(&self, repo: &RepoName, number: u64) -> Vec<String> {
        match self.tracker.list_comments(repo, number).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(repo = %repo, number, error = %e, "Failed to fetch comments, validating without them");
                Vec::new()
            }
        }
    }
}
