//! Generic issue-tracker abstraction for the BML sync platform.
//!
//! This crate provides:
//! - The [`IssueTracker`] trait: the minimal surface the sync engine needs
//!   from a remote tracker (search, create, edit, label, state, comment)
//! - [`GitHubTracker`]: an implementation over the GitHub REST v3 API
//! - Shared model types ([`RepoName`], [`IssueSummary`], [`IssueState`])
//!
//! Callers hold a `dyn IssueTracker` so tests and alternative backends can
//! substitute their own implementation.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Every async API method can fail the same way

pub mod error;
pub mod github;
pub mod models;

use async_trait::async_trait;

pub use error::TrackerError;
pub use github::GitHubTracker;
pub use models::{IssueState, IssueSummary, RepoName};

/// Remote issue-tracker operations used by the sync engine.
///
/// All methods are fallible with [`TrackerError`]; implementations are
/// expected to enforce their own request timeouts so no call blocks
/// indefinitely.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Search a repository for issues (open and closed) whose title contains
    /// the given text.
    async fn search_issues(
        &self,
        repo: &RepoName,
        title_contains: &str,
    ) -> Result<Vec<IssueSummary>, TrackerError>;

    /// Create an issue and return its number.
    async fn create_issue(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<u64, TrackerError>;

    /// Overwrite an issue's title.
    async fn edit_title(
        &self,
        repo: &RepoName,
        number: u64,
        title: &str,
    ) -> Result<(), TrackerError>;

    /// Add labels to an issue. A label missing from the repository surfaces
    /// as [`TrackerError::LabelNotConfigured`].
    async fn add_labels(
        &self,
        repo: &RepoName,
        number: u64,
        labels: &[String],
    ) -> Result<(), TrackerError>;

    /// Remove a label from an issue. Removing a label that is not present
    /// succeeds.
    async fn remove_label(
        &self,
        repo: &RepoName,
        number: u64,
        label: &str,
    ) -> Result<(), TrackerError>;

    /// Open or close an issue. Setting the current state is a no-op.
    async fn set_state(
        &self,
        repo: &RepoName,
        number: u64,
        state: IssueState,
    ) -> Result<(), TrackerError>;

    /// Append a comment to an issue.
    async fn add_comment(
        &self,
        repo: &RepoName,
        number: u64,
        body: &str,
    ) -> Result<(), TrackerError>;

    /// Current labels on an issue.
    async fn get_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<String>, TrackerError>;

    /// Comment bodies on an issue, oldest first.
    async fn list_comments(
        &self,
        repo: &RepoName,
        number: u64,
    ) -> Result<Vec<String>, TrackerError>;

    /// Create a repository label. Creating a label that already exists
    /// succeeds.
    async fn create_label(
        &self,
        repo: &RepoName,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<(), TrackerError>;
}
