//! Read-only workspace state queries, via libgit2.

use std::path::Path;

use git2::Repository;

use crate::error::{Error, Result};

/// Full SHA of the workspace's HEAD commit.
pub fn head_sha(workspace: &Path) -> Result<String> {
    let repo = Repository::open(workspace)?;
    let head = repo.head()?;
    Ok(head.peel_to_commit()?.id().to_string())
}

/// Short name of the currently checked-out branch.
pub fn current_branch(workspace: &Path) -> Result<String> {
    let repo = Repository::open(workspace)?;
    let head = repo.head()?;
    head.shorthand()
        .map(str::to_string)
        .ok_or_else(|| Error::Git(git2::Error::from_str("HEAD is not a named reference")))
}
