//! Repository synchronization and retry control for unattended GitHub
//! automation.
//!
//! The crate keeps one continuously-updated bare mirror per remote
//! repository, provisions throwaway working clones from it, pushes results
//! back with conflict classification, and wraps forge API calls so that
//! rate-limit rejections surface as a scheduler-visible retry signal
//! instead of a task failure.

pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod process;
pub mod retry;

pub use error::{Error, Result, RetrySignal};
