//! Webhook payload parsing and signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;

use tracker::IssueState;

use crate::engine::SourceIssueEvent;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook signature (`X-Hub-Signature-256` header,
/// `sha256=<hex>`) using HMAC-SHA256 over the raw body.
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(signature_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    // Constant-time comparison to prevent timing attacks
    computed.as_slice().ct_eq(&signature_bytes).into()
}

/// GitHub `issues` event payload (simplified).
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    /// Action type (opened, edited, labeled, unlabeled, closed, reopened).
    pub action: String,
    /// The issue the event is about.
    pub issue: IssuePayload,
    /// Repository the event came from.
    pub repository: RepositoryPayload,
    /// The label added or removed, for labeled/unlabeled actions.
    #[serde(default)]
    pub label: Option<LabelPayload>,
}

/// GitHub `issue_comment` event payload (simplified).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    /// Action type (created, edited, deleted).
    pub action: String,
    /// The issue the comment belongs to.
    pub issue: IssuePayload,
    /// Repository the event came from.
    pub repository: RepositoryPayload,
    /// The comment itself.
    pub comment: CommentPayload,
}

/// GitHub `repository_dispatch` event payload. The original cross-repo
/// path: a source repository dispatches its issue state to the meta
/// repository, with the event carried in `client_payload`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryDispatchEvent {
    /// The dispatch event type.
    pub action: String,
    /// Arbitrary payload supplied by the dispatching workflow.
    #[serde(default)]
    pub client_payload: serde_json::Value,
}

/// Issue fields used by the sync engine.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuePayload {
    /// Issue number.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue body.
    #[serde(default)]
    pub body: Option<String>,
    /// Issue state (open, closed).
    pub state: IssueState,
    /// Labels on the issue. For `labeled` events this already includes
    /// the label being added.
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
}

impl IssuePayload {
    /// Label names as a set.
    #[must_use]
    pub fn label_set(&self) -> BTreeSet<String> {
        self.labels.iter().map(|label| label.name.clone()).collect()
    }
}

/// Repository fields used by the sync engine.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    /// Full name (owner/repo).
    pub full_name: String,
}

/// GitHub label.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    /// Label name.
    pub name: String,
}

/// Comment fields used by the validator.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayload {
    /// Comment body.
    #[serde(default)]
    pub body: Option<String>,
}

impl IssuesEvent {
    /// Convert into the engine's event shape.
    ///
    /// Fails when the repository name is malformed.
    pub fn to_source_event(&self) -> Result<SourceIssueEvent, tracker::TrackerError> {
        Ok(SourceIssueEvent {
            source_repo: tracker::RepoName::new(&self.repository.full_name)?,
            number: self.issue.number,
            title: self.issue.title.clone(),
            body: self.issue.body.clone().unwrap_or_default(),
            state: self.issue.state,
            labels: self.issue.label_set(),
            action: self.action.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_webhook_signature_valid() {
        let body = b"test payload";
        let secret = "test-secret";
        let signature = sign(body, secret);
        assert!(verify_webhook_signature(body, &signature, secret));
    }

    #[test]
    fn test_verify_webhook_signature_invalid() {
        let body = b"test payload";
        let wrong =
            "sha256=0000000000000000000000000000000000000000000000000000000000000000";
        assert!(!verify_webhook_signature(body, wrong, "test-secret"));
    }

    #[test]
    fn test_verify_webhook_signature_requires_prefix() {
        let body = b"test payload";
        let secret = "test-secret";
        let unprefixed = sign(body, secret).trim_start_matches("sha256=").to_string();
        assert!(!verify_webhook_signature(body, &unprefixed, secret));
        assert!(!verify_webhook_signature(body, "sha256=not-hex", secret));
    }

    #[test]
    fn test_parse_issues_event() {
        let json = r#"{
            "action": "labeled",
            "issue": {
                "number": 42,
                "title": "Fix bug",
                "body": "Something is broken",
                "state": "open",
                "labels": [{"name": "status-build"}, {"name": "priority-high"}]
            },
            "repository": { "full_name": "acme/widgets" },
            "label": { "name": "status-build" }
        }"#;

        let event: IssuesEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, "labeled");
        assert_eq!(event.label.as_ref().unwrap().name, "status-build");

        let source = event.to_source_event().unwrap();
        assert_eq!(source.source_repo.as_str(), "acme/widgets");
        assert_eq!(source.number, 42);
        assert_eq!(source.state, IssueState::Open);
        assert!(source.labels.contains("priority-high"));
    }

    #[test]
    fn test_parse_issues_event_minimal() {
        // Null body and absent labels must not fail parsing.
        let json = r#"{
            "action": "opened",
            "issue": { "number": 1, "title": "t", "body": null, "state": "open" },
            "repository": { "full_name": "acme/widgets" }
        }"#;

        let event: IssuesEvent = serde_json::from_str(json).unwrap();
        let source = event.to_source_event().unwrap();
        assert_eq!(source.body, "");
        assert!(source.labels.is_empty());
        assert!(event.label.is_none());
    }

    #[test]
    fn test_parse_repository_dispatch() {
        let json = r#"{
            "action": "issue-sync",
            "client_payload": {
                "source_repo": "acme/widgets",
                "number": 42,
                "title": "Fix bug",
                "state": "open",
                "labels": ["status-plan"]
            }
        }"#;

        let event: RepositoryDispatchEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, "issue-sync");

        let source: SourceIssueEvent = serde_json::from_value(event.client_payload).unwrap();
        assert_eq!(source.number, 42);
        assert!(source.labels.contains("status-plan"));
    }
}
