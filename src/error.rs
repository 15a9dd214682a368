//! Crate-wide error type and scheduler-facing retry signalling.
//!
//! Operations that can lose a race against the outside world (a concurrent
//! push, an exhausted API quota) surface that as [`Error::Retry`] carrying a
//! [`RetrySignal`]. The invoking scheduler pattern-matches the variant and
//! reschedules the whole operation; every other variant is a terminal
//! failure. A `RetrySignal` is never nested inside another variant.

use thiserror::Error;

use crate::process::CommandError;

/// Tells the invoking scheduler to re-run the whole operation later,
/// optionally not before a given point in time.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RetrySignal {
    message: String,
    not_before: Option<u64>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RetrySignal {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            not_before: None,
            cause: None,
        }
    }

    /// Earliest unix timestamp (seconds) at which a retry can succeed.
    pub fn with_not_before(mut self, unix_secs: u64) -> Self {
        self.not_before = Some(unix_secs);
        self
    }

    pub fn with_cause(
        mut self,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn not_before(&self) -> Option<u64> {
        self.not_before
    }
}

/// Errors returned by synchronization and forge API operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation lost a recoverable race; reschedule it.
    #[error(transparent)]
    Retry(#[from] RetrySignal),

    /// An external command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The requested branch does not exist on the remote. Terminal; there
    /// is no point rescheduling.
    #[error("branch {0} not found in cached mirror")]
    BranchNotFound(String),

    /// libgit2 reported an error while inspecting a workspace.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// The forge API rejected a request for a reason other than rate
    /// limiting.
    #[error("github api request failed: {0}")]
    Api(#[source] Box<ureq::Error>),

    /// An invalid glob pattern was supplied.
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Underlying IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for Error {
    fn from(error: ureq::Error) -> Self {
        Error::Api(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
