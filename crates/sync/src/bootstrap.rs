//! Startup label bootstrap for the meta repository.

use tracing::{debug, info, warn};

use tracker::{IssueTracker, RepoName};

use crate::labels::{Status, SYNCED_LABEL};

/// Ensure the status vocabulary and the `synced` marker exist as labels in
/// the given repository.
///
/// Called once at service startup. Per-label failures are logged and
/// skipped; this never fails the caller.
pub async fn ensure_status_labels(tracker: &dyn IssueTracker, repo: &RepoName) {
    let mut created = 0usize;

    for status in Status::ALL {
        let label = status.label();
        let description = format!("BML status: {status}");
        match tracker
            .create_label(repo, &label, status.color(), &description)
            .await
        {
            Ok(()) => {
                debug!(repo = %repo, label = %label, "Status label ensured");
                created += 1;
            }
            Err(e) => warn!(repo = %repo, label = %label, error = %e, "Failed to ensure status label"),
        }
    }

    if let Err(e) = tracker
        .create_label(
            repo,
            SYNCED_LABEL,
            "c5def5",
            "Mirrored from a source repository",
        )
        .await
    {
        warn!(repo = %repo, label = SYNCED_LABEL, error = %e, "Failed to ensure synced label");
    } else {
        created += 1;
    }

    info!(repo = %repo, ensured = created, "Label bootstrap complete");
}
