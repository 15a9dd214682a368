//! Bare mirror cache, one per repository identity.
//!
//! Mirrors live under `<cache root>/<host>/<org>/<repo>` (lowercased) and
//! are fetched with `--force --prune` on every access so they track remote
//! deletions and force-pushes, not just additions. There is no cross-process
//! locking here: concurrent fetches into the same mirror are safe apart from
//! git's own transient ref-lock errors, which are retried.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::config::{BotConfig, host_of};
use crate::error::Result;
use crate::process::{CommandRunner, SystemRunner};
use crate::retry::RetryPolicy;

/// Text git emits when a concurrent process holds a ref lock in the mirror.
/// The exact wording is tooling-version-dependent, hence overridable via
/// [`MirrorCache::with_fetch_retry`].
pub const DEFAULT_REF_LOCK_PATTERN: &str = "cannot lock ref";

const FETCH_RETRIES: u32 = 3;
const FETCH_RETRY_SLEEP: Duration = Duration::from_secs(10);

/// Identity of a remote repository, `org/repo`.
///
/// Cache addressing is case-insensitive; URL derivation keeps the original
/// case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    org: String,
    repo: String,
}

/// The input was not of the form `org/repo`.
#[derive(Debug, Error)]
#[error("expected org/repo, got `{0}`")]
pub struct ParseRepoIdError(String);

impl RepoId {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `<root>/<host>/<org>/<repo>`, lowercased.
    pub fn cache_path(&self, root: &Path, host: &str) -> PathBuf {
        root.join(host)
            .join(self.org.to_lowercase())
            .join(self.repo.to_lowercase())
    }

    pub fn clone_url(&self, base: &str) -> String {
        format!("{}/{}/{}", base.trim_end_matches('/'), self.org, self.repo)
    }

    /// Clone URL with the token embedded, for use as the push URL only, so
    /// the token never appears in fetch errors or logs.
    pub fn push_url(&self, base: &str, token: Option<&str>) -> String {
        match (token, base.strip_prefix("https://")) {
            (Some(token), Some(rest)) if !token.is_empty() => format!(
                "https://{}@{}/{}/{}",
                token,
                rest.trim_end_matches('/'),
                self.org,
                self.repo
            ),
            _ => self.clone_url(base),
        }
    }
}

impl FromStr for RepoId {
    type Err = ParseRepoIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((org, repo)) if !org.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self::new(org, repo))
            }
            _ => Err(ParseRepoIdError(s.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Manages one bare mirror per repository identity.
pub struct MirrorCache<R = SystemRunner> {
    runner: R,
    root: PathBuf,
    host: String,
    base_url: String,
    fetch_retry: RetryPolicy,
}

impl MirrorCache<SystemRunner> {
    pub fn from_config(config: &BotConfig) -> Self {
        let mut runner = SystemRunner::new();
        if let Some(token) = &config.github_token {
            runner = runner.with_secret(token);
        }
        Self::new(runner, config.cache_dir.clone(), config.github_url.clone())
    }
}

impl<R: CommandRunner> MirrorCache<R> {
    pub fn new(runner: R, root: PathBuf, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            runner,
            root,
            host: host_of(&base_url),
            base_url,
            fetch_retry: RetryPolicy::new(DEFAULT_REF_LOCK_PATTERN)
                .expect("default ref-lock pattern is a valid regex")
                .max_retries(FETCH_RETRIES)
                .sleep(FETCH_RETRY_SLEEP),
        }
    }

    /// Override how transient fetch failures are classified and retried.
    pub fn with_fetch_retry(mut self, fetch_retry: RetryPolicy) -> Self {
        self.fetch_retry = fetch_retry;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mirror_path(&self, id: &RepoId) -> PathBuf {
        id.cache_path(&self.root, &self.host)
    }

    /// Ensure the bare mirror exists and holds the remote's current set of
    /// branches. Returns the mirror path.
    ///
    /// Initialization is one-time and non-retriable; the fetch is retried
    /// against transient ref-lock contention from concurrent operations on
    /// the same mirror.
    pub fn ensure(&self, id: &RepoId) -> Result<PathBuf> {
        let path = self.mirror_path(id);
        if !path.is_dir() {
            info!("initializing bare mirror for {id} at {}", path.display());
            std::fs::create_dir_all(&path)?;
            self.runner.run_checked(&["git", "init", "--bare"], &path, true)?;
        }
        let url = id.clone_url(&self.base_url);
        debug!("updating mirror for {id} from {url}");
        self.fetch_retry.run(|| {
            self.runner.run_checked(
                &[
                    "git",
                    "fetch",
                    "--quiet",
                    "--force",
                    "--prune",
                    &url,
                    "refs/heads/*:refs/heads/*",
                ],
                &path,
                true,
            )
        })?;
        Ok(path)
    }

    /// Branch names currently present in the mirror.
    pub fn local_branches(&self, id: &RepoId) -> Result<Vec<String>> {
        let path = self.mirror_path(id);
        let output = self.runner.run_checked(
            &["git", "branch", "--format=%(refname:short)"],
            &path,
            true,
        )?;
        Ok(output
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}
