//! GitHub REST v3 implementation of [`IssueTracker`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Response;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::TrackerError;
use crate::models::{IssueState, IssueSummary, RepoName};
use crate::IssueTracker;

const GITHUB_API_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issue tracker backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubTracker {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

/// GitHub API error response body.
#[derive(Debug, Deserialize)]
struct GitHubError {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    documentation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    number: u64,
    title: String,
    state: IssueState,
    #[serde(default)]
    labels: Vec<WireLabel>,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    items: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
}

impl GitHubTracker {
    /// Create a tracker client for the public GitHub API.
    pub fn new(token: &str) -> Result<Self, TrackerError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a tracker client against a custom API base URL (used by tests
    /// and GitHub Enterprise installs).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, TrackerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("bml-sync/0.1"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn issue_url(&self, repo: &RepoName, number: u64) -> String {
        format!("{}/repos/{repo}/issues/{number}", self.base_url)
    }

    /// Decode a non-success response into an API error.
    async fn api_error(response: Response) -> TrackerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubError>(&body)
            .map_or(body, |err| err.message);
        TrackerError::Api { status, message }
    }
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn search_issues(
        &self,
        repo: &RepoName,
        title_contains: &str,
    ) -> Result<Vec<IssueSummary>, TrackerError> {
        let url = format!("{}/search/issues", self.base_url);
        let query = format!("repo:{repo} in:title \"{title_contains}\"");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .query(&[("q", query.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let results: SearchResults = response.json().await?;
        debug!(hits = results.items.len(), "Issue search complete");

        Ok(results
            .items
            .into_iter()
            .map(|issue| IssueSummary {
                number: issue.number,
                title: issue.title,
                state: issue.state,
                labels: issue.labels.into_iter().map(|label| label.name).collect(),
            })
            .collect())
    }

    #[instrument(skip(self, body), fields(repo = %repo, title = %title))]
    async fn create_issue(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<u64, TrackerError> {
        let url = format!("{}/repos/{repo}/issues", self.base_url);
        let request = serde_json::json!({
            "title": title,
            "body": body,
            "labels": labels,
        });

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let created: CreatedIssue = response.json().await?;
        debug!(number = created.number, "Created issue");
        Ok(created.number)
    }

    async fn edit_title(
        &self,
        repo: &RepoName,
        number: u64,
        title: &str,
    ) -> Result<(), TrackerError> {
        let response = self
            .client
            .patch(self.issue_url(repo, number))
            .header(AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo, number = number, labels = ?labels))]
    async fn add_labels(
        &self,
        repo: &RepoName,
        number: u64,
        labels: &[String],
    ) -> Result<(), TrackerError> {
        if labels.is_empty() {
            return Ok(());
        }

        let url = format!("{}/labels", self.issue_url(repo, number));
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "labels": labels }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            404 | 422 => Err(TrackerError::LabelNotConfigured {
                repo: repo.to_string(),
                label: labels.join(", "),
            }),
            _ => Err(Self::api_error(response).await),
        }
    }

    #[instrument(skip(self), fields(repo = %repo, number = number, label = %label))]
    async fn remove_label(
        &self,
        repo: &RepoName,
        number: u64,
        label: &str,
    ) -> Result<(), TrackerError> {
        let url = format!(
            "{}/labels/{}",
            self.issue_url(repo, number),
            urlencoding::encode(label)
        );
        let response = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            404 => {
                // Label already absent, which is fine for removal
                debug!("Label not present, nothing to remove");
                Ok(())
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn set_state(
        &self,
        repo: &RepoName,
        number: u64,
        state: IssueState,
    ) -> Result<(), TrackerError> {
        let response = self
            .client
            .patch(self.issue_url(repo, number))
            .header(AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "state": state.as_str() }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn add_comment(
        &self,
        repo: &RepoName,
        number: u64,
        body: &str,
    ) -> Result<(), TrackerError> {
        let url = format!("{}/comments", self.issue_url(repo, number));
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn get_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<String>, TrackerError> {
        let url = format!("{}/labels", self.issue_url(repo, number));
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let labels: Vec<WireLabel> = response.json().await?;
        Ok(labels.into_iter().map(|label| label.name).collect())
    }

    async fn list_comments(
        &self,
        repo: &RepoName,
        number: u64,
    ) -> Result<Vec<String>, TrackerError> {
        let url = format!("{}/comments", self.issue_url(repo, number));
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let comments: Vec<WireComment> = response.json().await?;
        Ok(comments
            .into_iter()
            .map(|comment| comment.body.unwrap_or_default())
            .collect())
    }

    #[instrument(skip(self), fields(repo = %repo, name = %name))]
    async fn create_label(
        &self,
        repo: &RepoName,
        name: &str,
        color: &str,
        description: &str,
    ) -> Result<(), TrackerError> {
        let url = format!("{}/repos/{repo}/labels", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&serde_json::json!({
                "name": name,
                "color": color,
                "description": description,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            422 => {
                // already_exists validation failure; creation is idempotent
                debug!("Label already exists");
                Ok(())
            }
            _ => {
                let err = Self::api_error(response).await;
                warn!(error = %err, "Failed to create label");
                Err(err)
            }
        }
    }
}
