//! HTTP server wiring GitHub webhook deliveries to the sync engine.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use tracker::RepoName;

use crate::config::Config;
use crate::engine::{SourceIssueEvent, SyncEngine, SyncError};
use crate::labels::Status;
use crate::webhooks::{
    verify_webhook_signature, IssueCommentEvent, IssuesEvent, RepositoryDispatchEvent,
};
use crate::workflow::TransitionSnapshot;

/// Issue actions that trigger a sync.
const SYNCED_ACTIONS: [&str; 6] = [
    "opened",
    "edited",
    "labeled",
    "unlabeled",
    "closed",
    "reopened",
];

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Config,
    /// The sync engine.
    pub engine: Arc<SyncEngine>,
}

/// Build the HTTP router for the sync service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    if state.config.meta_repo.is_none() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({ "status": "ready" })))
}

/// Handle incoming GitHub webhooks.
///
/// This handler:
/// 1. Verifies the webhook signature (if a secret is configured)
/// 2. Routes on the `X-GitHub-Event` header
/// 3. Answers 502 for retryable transport failures so the sender's
///    redelivery kicks in; all other outcomes are 200 with a JSON status
pub async fn github_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let delivery_id = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info!(
        event_type = %event_type,
        delivery_id = %delivery_id,
        "Received GitHub webhook"
    );

    if let Some(secret) = &state.config.webhook_secret {
        let Some(signature) = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
        else {
            warn!("Missing X-Hub-Signature-256 header");
            return Err(StatusCode::UNAUTHORIZED);
        };

        if !verify_webhook_signature(&body, signature, secret) {
            warn!("Invalid webhook signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
        debug!("Webhook signature verified");
    }

    match event_type {
        "issues" => {
            let event: IssuesEvent = serde_json::from_slice(&body).map_err(|e| {
                error!(error = %e, "Failed to parse issues payload");
                StatusCode::BAD_REQUEST
            })?;
            handle_issues_event(&state, event).await
        }
        "issue_comment" => {
            let event: IssueCommentEvent = serde_json::from_slice(&body).map_err(|e| {
                error!(error = %e, "Failed to parse issue_comment payload");
                StatusCode::BAD_REQUEST
            })?;
            handle_comment_event(&state, event).await
        }
        "repository_dispatch" => {
            let event: RepositoryDispatchEvent = serde_json::from_slice(&body).map_err(|e| {
                error!(error = %e, "Failed to parse repository_dispatch payload");
                StatusCode::BAD_REQUEST
            })?;
            handle_dispatch_event(&state, event).await
        }
        _ => {
            debug!(event_type = %event_type, "Ignoring unhandled event type");
            Ok(Json(json!({
                "status": "ignored",
                "reason": "unhandled_event_type"
            })))
        }
    }
}

/// Handle an `issues` event from either side of the sync.
async fn handle_issues_event(
    state: &AppState,
    event: IssuesEvent,
) -> Result<Json<Value>, StatusCode> {
    let repo = match RepoName::new(&event.repository.full_name) {
        Ok(repo) => repo,
        Err(e) => {
            warn!(repo = %event.repository.full_name, error = %e, "Malformed repository name");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    if &repo == state.engine.meta_repo() {
        return handle_meta_event(state, &event).await;
    }

    if !SYNCED_ACTIONS.contains(&event.action.as_str()) {
        debug!(action = %event.action, "Ignoring issues action");
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "unhandled_action"
        })));
    }

    let source_event = match event.to_source_event() {
        Ok(source_event) => source_event,
        Err(e) => {
            warn!(error = %e, "Failed to build source event");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    // Advisory pass on label changes: validate against a snapshot taken
    // before the propagation writes anything.
    match event.action.as_str() {
        "labeled" => {
            if let Some(label) = &event.label {
                advise_on_label(state, &repo, &source_event, Some(&label.name)).await;
            }
        }
        "unlabeled" => advise_on_label(state, &repo, &source_event, None).await,
        _ => {}
    }

    match state.engine.propagate(&source_event).await {
        Ok(outcome) => Ok(Json(json!({
            "status": "accepted",
            "action": source_event.action,
            "source": source_event.source_ref().to_string(),
            "wrapper": outcome.wrapper,
            "created": outcome.created,
        }))),
        Err(e) => fail_response(&e),
    }
}

/// Run the workflow validator for a label change and post any advisories
/// on the source issue. Never fails the surrounding sync.
///
/// For `labeled` events the payload's label set already includes the added
/// label, so current is that set minus the addition; for `unlabeled` events
/// the removed label is already gone and nothing is incoming.
async fn advise_on_label(
    state: &AppState,
    repo: &RepoName,
    source_event: &SourceIssueEvent,
    added_label: Option<&str>,
) {
    let mut current = source_event.labels.clone();
    let mut incoming = BTreeSet::new();
    if let Some(label) = added_label {
        current.remove(label);
        incoming.insert(label.to_string());
    }

    let comments = state
        .engine
        .comment_snapshot(repo, source_event.number)
        .await;

    let snapshot = TransitionSnapshot {
        current,
        incoming,
        comments,
    };

    if let Err(e) = state
        .engine
        .advise(repo, source_event.number, &snapshot)
        .await
    {
        warn!(repo = %repo, number = source_event.number, error = %e, "Advisory pass failed");
    }
}

/// Handle an `issues` event from the meta repository itself. Only the
/// terminal `status-archived` label addition is acted on; everything else
/// is ignored so wrapper edits made by the sync never loop back.
async fn handle_meta_event(
    state: &AppState,
    event: &IssuesEvent,
) -> Result<Json<Value>, StatusCode> {
    let is_archive = event.action == "labeled"
        && event
            .label
            .as_ref()
            .is_some_and(|label| label.name == Status::Archived.label());

    if !is_archive {
        debug!(action = %event.action, "Ignoring meta-repo event");
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "meta_repo_event"
        })));
    }

    match state
        .engine
        .close_archived(event.issue.number, &event.issue.title)
        .await
    {
        Ok(Some(source)) => Ok(Json(json!({
            "status": "accepted",
            "action": "archive_closed",
            "source": source.to_string(),
            "wrapper": event.issue.number,
        }))),
        Ok(None) => Ok(Json(json!({
            "status": "ignored",
            "reason": "no_source_reference"
        }))),
        Err(e) => fail_response(&e),
    }
}

/// Handle a new comment on a source issue: re-evaluate the blocked
/// explanation rule.
async fn handle_comment_event(
    state: &AppState,
    event: IssueCommentEvent,
) -> Result<Json<Value>, StatusCode> {
    if event.action != "created" {
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "unhandled_action"
        })));
    }

    let repo = match RepoName::new(&event.repository.full_name) {
        Ok(repo) => repo,
        Err(e) => {
            warn!(repo = %event.repository.full_name, error = %e, "Malformed repository name");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    if &repo == state.engine.meta_repo() {
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "meta_repo_event"
        })));
    }

    let mut comments = state.engine.comment_snapshot(&repo, event.issue.number).await;
    // The fetched history may not include the comment that triggered this
    // event yet.
    if let Some(body) = &event.comment.body {
        if !comments.iter().any(|comment| comment == body) {
            comments.push(body.clone());
        }
    }

    let snapshot = TransitionSnapshot {
        current: event.issue.label_set(),
        incoming: BTreeSet::new(),
        comments,
    };

    match state.engine.advise(&repo, event.issue.number, &snapshot).await {
        Ok(count) => Ok(Json(json!({
            "status": "accepted",
            "advisories": count,
        }))),
        Err(e) => fail_response(&e),
    }
}

/// Handle a cross-repo dispatch carrying a source issue event.
async fn handle_dispatch_event(
    state: &AppState,
    event: RepositoryDispatchEvent,
) -> Result<Json<Value>, StatusCode> {
    if event.action != "issue-sync" {
        debug!(action = %event.action, "Ignoring dispatch type");
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "unhandled_dispatch_type"
        })));
    }

    let source_event: SourceIssueEvent = match serde_json::from_value(event.client_payload) {
        Ok(source_event) => source_event,
        Err(e) => {
            error!(error = %e, "Failed to parse dispatch client_payload");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    if &source_event.source_repo == state.engine.meta_repo() {
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "meta_repo_event"
        })));
    }

    match state.engine.propagate(&source_event).await {
        Ok(outcome) => Ok(Json(json!({
            "status": "accepted",
            "action": "issue-sync",
            "source": source_event.source_ref().to_string(),
            "wrapper": outcome.wrapper,
            "created": outcome.created,
        }))),
        Err(e) => fail_response(&e),
    }
}

/// Map an engine failure to the webhook response: retryable transport
/// failures become 502 so the sender redelivers; everything else is a
/// terminal JSON error.
fn fail_response(e: &SyncError) -> Result<Json<Value>, StatusCode> {
    if e.is_retryable() {
        error!(error = %e, "Sync aborted on transport failure");
        Err(StatusCode::BAD_GATEWAY)
    } else {
        error!(error = %e, "Sync failed");
        Ok(Json(json!({
            "status": "error",
            "error": format!("{e}")
        })))
    }
}
