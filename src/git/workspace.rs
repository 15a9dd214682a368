//! Ephemeral working clones provisioned from the mirror cache.

use std::path::Path;

use log::debug;
use tempfile::TempDir;

use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::process::{CommandRunner, SystemRunner};

use super::mirror::{MirrorCache, RepoId};

/// A disposable working clone checked out to a single branch.
///
/// Exclusively owned by the operation that provisioned it. The backing
/// directory is removed when the workspace is dropped, on every exit path,
/// so no workspace survives past its owning call.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Provisions workspaces on top of a [`MirrorCache`].
pub struct Provisioner<R = SystemRunner> {
    cache: MirrorCache<R>,
    token: Option<String>,
    git_name: Option<String>,
    git_email: Option<String>,
}

impl Provisioner<SystemRunner> {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            cache: MirrorCache::from_config(config),
            token: config.github_token.clone(),
            git_name: config.git_name.clone(),
            git_email: config.git_email.clone(),
        }
    }
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(cache: MirrorCache<R>) -> Self {
        Self {
            cache,
            token: None,
            git_name: None,
            git_email: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_identity(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.git_name = name;
        self.git_email = email;
        self
    }

    pub fn cache(&self) -> &MirrorCache<R> {
        &self.cache
    }

    /// Clone `branch` into a fresh temporary directory, referencing the
    /// mirror for objects already present locally.
    ///
    /// The clone still talks to the remote URL, so the mirror only spares
    /// object transfer, never freshness. A missing branch fails with
    /// [`Error::BranchNotFound`] before any temporary directory exists.
    pub fn temporary_clone(&self, id: &RepoId, branch: &str) -> Result<Workspace> {
        let mirror = self.cache.ensure(id)?;
        if !self.cache.local_branches(id)?.iter().any(|b| b == branch) {
            return Err(Error::BranchNotFound(branch.to_string()));
        }

        let dir = TempDir::new()?;
        let runner = self.cache.runner();
        let url = id.clone_url(self.cache.base_url());
        let mirror_str = mirror.to_string_lossy();
        let dest = dir.path().to_string_lossy();
        runner.run_checked(
            &[
                "git",
                "clone",
                "--quiet",
                "--reference",
                &mirror_str,
                "--branch",
                branch,
                "--",
                &url,
                &dest,
            ],
            &mirror,
            true,
        )?;

        if let Some(name) = &self.git_name {
            runner.run_checked(&["git", "config", "user.name", name], dir.path(), true)?;
        }
        if let Some(email) = &self.git_email {
            runner.run_checked(&["git", "config", "user.email", email], dir.path(), true)?;
        }

        // Only the push URL carries the token; the fetch URL stays clean so
        // it can show up in errors and logs.
        let push_url = id.push_url(self.cache.base_url(), self.token.as_deref());
        runner.run_checked(
            &["git", "remote", "set-url", "--push", "origin", &push_url],
            dir.path(),
            true,
        )?;

        debug!(
            "provisioned workspace for {id}@{branch} at {}",
            dir.path().display()
        );
        Ok(Workspace { dir })
    }
}
