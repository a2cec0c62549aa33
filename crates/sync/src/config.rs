//! Configuration for the sync service.

use std::env;
use tracing::warn;

use tracker::RepoName;

/// Sync service configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// GitHub token for API calls.
    pub github_token: Option<String>,
    /// Meta repository wrapper issues are created in (`owner/repo`).
    pub meta_repo: Option<RepoName>,
    /// Webhook signing secret for signature verification. When unset,
    /// signature checks are skipped (development mode).
    pub webhook_secret: Option<String>,
    /// Path of the persisted wrapper index.
    pub index_path: String,
    /// Whether to create missing status labels in the meta repo at startup.
    pub bootstrap_labels: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("SYNC_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
            meta_repo: env::var("META_REPO").ok().and_then(|s| {
                RepoName::new(&s)
                    .map_err(|e| warn!(value = %s, error = %e, "Ignoring invalid META_REPO"))
                    .ok()
            }),
            webhook_secret: env::var("SYNC_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            index_path: env::var("WRAPPER_INDEX_PATH")
                .unwrap_or_else(|_| "wrapper-index.json".to_string()),
            bootstrap_labels: env::var("SYNC_BOOTSTRAP_LABELS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("SYNC_PORT");
        env::remove_var("GITHUB_TOKEN");
        env::remove_var("META_REPO");
        env::remove_var("SYNC_WEBHOOK_SECRET");
        env::remove_var("WRAPPER_INDEX_PATH");
        env::remove_var("SYNC_BOOTSTRAP_LABELS");
    }

    #[test]
    fn test_default_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert!(config.github_token.is_none());
        assert!(config.meta_repo.is_none());
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.index_path, "wrapper-index.json");
        assert!(config.bootstrap_labels);
    }

    #[test]
    fn test_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("SYNC_PORT", "9000");
        env::set_var("META_REPO", "acme/meta");
        env::set_var("SYNC_WEBHOOK_SECRET", "secret");
        env::set_var("SYNC_BOOTSTRAP_LABELS", "false");

        let config = Config::default();
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.meta_repo.as_ref().map(RepoName::as_str),
            Some("acme/meta")
        );
        assert_eq!(config.webhook_secret.as_deref(), Some("secret"));
        assert!(!config.bootstrap_labels);

        clear_env();
    }

    #[test]
    fn test_invalid_meta_repo_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("META_REPO", "not-a-repo");
        let config = Config::default();
        assert!(config.meta_repo.is_none());

        clear_env();
    }
}
