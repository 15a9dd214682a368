//! Local git plumbing: mirror cache, ephemeral workspaces, state
//! inspection, and commit/push synchronization.
//!
//! Write operations shell out to the git binary through the
//! [`crate::process::CommandRunner`] seam; read-only inspection goes
//! through libgit2.

mod inspect;
mod mirror;
mod sync;
mod workspace;

pub use inspect::{current_branch, head_sha};
pub use mirror::{DEFAULT_REF_LOCK_PATTERN, MirrorCache, ParseRepoIdError, RepoId};
pub use sync::{CommitOutcome, PushOutcome, commit_if_needed, push_if_needed};
pub use workspace::{Provisioner, Workspace};
