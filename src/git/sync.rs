//! Commit and push synchronization against a moving remote.

use std::path::Path;

use log::{debug, error};

use crate::error::{Error, Result, RetrySignal};
use crate::process::{CommandError, CommandRunner};

/// Markers git emits when a push loses the race against another writer of
/// the same branch: `non-fast-forward` when the stale remote tip is known
/// locally, `fetch first` when it is not.
const REJECTED_PUSH_MARKERS: [&str; 2] = ["non-fast-forward", "fetch first"];

/// What [`commit_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The glob matched no files; nothing was staged.
    NoMatches,
    /// Files matched but their content equals HEAD; nothing was committed.
    NoChanges,
    Committed,
}

/// What [`push_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The local branch already equals the remote branch.
    NothingToPush,
}

/// Stage the files matching `pattern` under `workspace` and commit them if
/// the staged diff against HEAD is non-empty.
///
/// Staging passes exactly the matched paths, never picking up unrelated
/// changes elsewhere in the workspace.
pub fn commit_if_needed(
    runner: &dyn CommandRunner,
    pattern: &str,
    message: &str,
    workspace: &Path,
) -> Result<CommitOutcome> {
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&workspace.to_string_lossy()),
        pattern
    );
    let mut files = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        files.push(entry.map_err(glob::GlobError::into_error)?);
    }
    if files.is_empty() {
        debug!("glob {pattern} matched nothing under {}", workspace.display());
        return Ok(CommitOutcome::NoMatches);
    }

    let rendered: Vec<String> = files
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    let mut argv: Vec<&str> = vec!["git", "add", "--"];
    argv.extend(rendered.iter().map(String::as_str));
    runner.run_checked(&argv, workspace, true)?;

    if runner.run(&["git", "diff", "--cached", "--quiet", "--exit-code"], workspace)? == 0 {
        debug!("glob {pattern} matched {} unchanged files", files.len());
        return Ok(CommitOutcome::NoChanges);
    }
    runner.run_checked(&["git", "commit", "-m", message], workspace, true)?;
    Ok(CommitOutcome::Committed)
}

/// Push the current HEAD to `remote`/`branch` if the two differ.
///
/// A rejection caused by another writer advancing the branch surfaces as
/// [`Error::Retry`]; the caller is expected to re-derive its change against
/// the new remote state on the next attempt. Every other push failure is
/// logged with full command context and re-raised as fatal.
pub fn push_if_needed(
    runner: &dyn CommandRunner,
    remote: &str,
    branch: &str,
    workspace: &Path,
) -> Result<PushOutcome> {
    let target = format!("{remote}/{branch}");
    if runner.run(&["git", "diff", "--quiet", "--exit-code", &target], workspace)? == 0 {
        debug!("{target} already matches HEAD, nothing to push");
        return Ok(PushOutcome::NothingToPush);
    }
    match runner.run_checked(&["git", "push", remote, branch], workspace, false) {
        Ok(_) => Ok(PushOutcome::Pushed),
        Err(failure) if is_rejected_push(&failure) => Err(Error::Retry(
            RetrySignal::new(format!("push to {target} rejected, remote branch moved"))
                .with_cause(failure),
        )),
        Err(failure) => {
            error!("{failure}");
            Err(failure.into())
        }
    }
}

fn is_rejected_push(failure: &CommandError) -> bool {
    REJECTED_PUSH_MARKERS
        .iter()
        .any(|marker| failure.output().contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use tempfile::tempdir;

    use crate::process::cmd_to_str;

    /// Scripted runner: records every invocation, answers `git diff` with a
    /// fixed exit code and `git push` with a fixed result.
    struct FakeRunner {
        calls: RefCell<Vec<String>>,
        diff_code: i32,
        push_failure: Option<(i32, String)>,
    }

    impl FakeRunner {
        fn new(diff_code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                diff_code,
                push_failure: None,
            }
        }

        fn failing_push(diff_code: i32, code: i32, output: &str) -> Self {
            Self {
                push_failure: Some((code, output.to_string())),
                ..Self::new(diff_code)
            }
        }

        fn record(&self, argv: &[&str]) {
            self.calls.borrow_mut().push(cmd_to_str(argv));
        }

        fn invoked(&self, subcommand: &str) -> bool {
            self.calls
                .borrow()
                .iter()
                .any(|call| call.starts_with(&format!("git {subcommand}")))
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, argv: &[&str], _cwd: &Path) -> std::result::Result<i32, CommandError> {
            self.record(argv);
            match argv.get(1) {
                Some(&"diff") => Ok(self.diff_code),
                _ => Ok(0),
            }
        }

        fn run_checked(
            &self,
            argv: &[&str],
            _cwd: &Path,
            _log_errors: bool,
        ) -> std::result::Result<String, CommandError> {
            self.record(argv);
            match (argv.get(1), &self.push_failure) {
                (Some(&"push"), Some((code, output))) => Err(CommandError::Failed {
                    command: cmd_to_str(argv),
                    code: *code,
                    output: output.clone(),
                }),
                _ => Ok(String::new()),
            }
        }
    }

    #[test]
    fn commit_with_no_matches_runs_nothing() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new(1);
        let outcome = commit_if_needed(&runner, "*.po", "translate", dir.path()).unwrap();
        assert_eq!(outcome, CommitOutcome::NoMatches);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn commit_with_unchanged_files_stages_but_does_not_commit() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.po"), "msgid\n").unwrap();
        let runner = FakeRunner::new(0);
        let outcome = commit_if_needed(&runner, "*.po", "translate", dir.path()).unwrap();
        assert_eq!(outcome, CommitOutcome::NoChanges);
        assert!(runner.invoked("add"));
        assert!(!runner.invoked("commit"));
    }

    #[test]
    fn commit_stages_exactly_the_matched_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.po"), "msgid\n").unwrap();
        std::fs::write(dir.path().join("other.txt"), "untouched\n").unwrap();
        let runner = FakeRunner::new(1);
        let outcome = commit_if_needed(&runner, "*.po", "translate", dir.path()).unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let calls = runner.calls.borrow();
        let add = calls.iter().find(|c| c.starts_with("git add")).unwrap();
        assert!(add.contains("a.po"));
        assert!(!add.contains("other.txt"));
        assert!(add.contains(" -- "));
        assert!(calls.iter().any(|c| c.starts_with("git commit")));
    }

    #[test]
    fn push_skipped_when_remote_matches() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new(0);
        let outcome = push_if_needed(&runner, "origin", "main", dir.path()).unwrap();
        assert_eq!(outcome, PushOutcome::NothingToPush);
        assert!(!runner.invoked("push"));
    }

    #[test]
    fn push_happens_when_remote_differs() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new(1);
        let outcome = push_if_needed(&runner, "origin", "main", dir.path()).unwrap();
        assert_eq!(outcome, PushOutcome::Pushed);
        assert!(runner.invoked("push"));
    }

    #[test]
    fn rejected_push_raises_retry_signal() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::failing_push(
            1,
            1,
            " ! [rejected]  main -> main (non-fast-forward)\nerror: failed to push some refs\n",
        );
        let error = push_if_needed(&runner, "origin", "main", dir.path()).unwrap_err();
        assert!(matches!(error, Error::Retry(_)));
    }

    #[test]
    fn stale_remote_rejection_also_raises_retry_signal() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::failing_push(
            1,
            1,
            " ! [rejected]  main -> main (fetch first)\nerror: failed to push some refs\n",
        );
        let error = push_if_needed(&runner, "origin", "main", dir.path()).unwrap_err();
        assert!(matches!(error, Error::Retry(_)));
    }

    #[test]
    fn other_push_failures_are_fatal() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::failing_push(1, 128, "fatal: could not read from remote\n");
        let error = push_if_needed(&runner, "origin", "main", dir.path()).unwrap_err();
        assert!(matches!(error, Error::Command(_)));
    }
}
